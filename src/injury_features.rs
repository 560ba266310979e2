use chrono::{Datelike, Months, NaiveDate, Weekday};

use crate::aggregate::FeatureMap;
use crate::stats_fetch::InjuryEvent;

/// Temporal features derived from a player's injury history relative to a
/// reference date. Zero history yields zero counts but sentinel recency/gap
/// values; the per-feature zero-vs-sentinel split matches the trained
/// feature set and is deliberate.
pub fn injury_history_features(
    history: &[InjuryEvent],
    reference: NaiveDate,
    window_len: usize,
    season: i32,
) -> FeatureMap {
    let mut out = FeatureMap::new();
    let mut put = |name: &str, value: Option<f64>| {
        out.insert(name.to_string(), value);
    };

    // Calendar block: a property of the reference date itself, defined even
    // for players with no history at all.
    put("injury_month", Some(reference.month() as f64));
    put(
        "injury_dow",
        Some(reference.weekday().num_days_from_monday() as f64),
    );
    put("inj_doy", Some(reference.ordinal() as f64));
    put("inj_weekofyear", Some(reference.iso_week().week() as f64));
    put("inj_quarter", Some((reference.month0() / 3 + 1) as f64));
    let weekend = matches!(reference.weekday(), Weekday::Sat | Weekday::Sun);
    put("inj_on_weekend", Some(if weekend { 1.0 } else { 0.0 }));
    put("prev_fixtures_count", Some(window_len as f64));

    let mut events: Vec<&InjuryEvent> = history.iter().collect();
    events.sort_by_key(|e| e.date);

    let total = events.len();
    let count_since = |months: u32| {
        let cutoff = reference
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN);
        events.iter().filter(|e| e.date >= cutoff).count()
    };
    let count_1m = count_since(1);
    let count_3m = count_since(3);
    let count_6m = count_since(6);
    let count_12m = count_since(12);
    let season_count = events.iter().filter(|e| e.season == season).count();
    let prev_season_count = events.iter().filter(|e| e.season == season - 1).count();

    put("inj_count_last_1m", Some(count_1m as f64));
    put("inj_count_last_3m", Some(count_3m as f64));
    put("inj_count_last_6m", Some(count_6m as f64));
    put("inj_count_last_12m", Some(count_12m as f64));
    put("inj_count_total", Some(total as f64));
    put("inj_count_season", Some(season_count as f64));
    put("inj_count_prev_season", Some(prev_season_count as f64));
    put("inj_seq_overall", Some(total as f64));
    put("inj_seq_season", Some(season_count as f64));

    let (first, last) = match (events.first(), events.last()) {
        (Some(f), Some(l)) => (f.date, l.date),
        _ => {
            put("days_since_last_injury", None);
            put("days_since_first_injury", None);
            put("avg_days_between_prev", None);
            put("std_days_between_prev", None);
            put("inj_rate_per_fixture_total", None);
            put("inj_rate_per_fixture_6m", None);
            // No history keeps the rate and the fraction at zero, not at the
            // sentinel. Preserved as trained.
            put("inj_rate_per_year", Some(0.0));
            put("inj_frac_last_6m", Some(0.0));
            return out;
        }
    };

    let days_since_last = reference.signed_duration_since(last).num_days() as f64;
    let days_since_first = reference.signed_duration_since(first).num_days() as f64;
    put("days_since_last_injury", Some(days_since_last));
    put("days_since_first_injury", Some(days_since_first));

    let gaps: Vec<f64> = events
        .windows(2)
        .map(|pair| pair[1].date.signed_duration_since(pair[0].date).num_days() as f64)
        .collect();
    put("avg_days_between_prev", mean(&gaps));
    put("std_days_between_prev", sample_std(&gaps));

    put("inj_frac_last_6m", Some(count_6m as f64 / total as f64));

    let rate_per_year = if days_since_first > 0.0 {
        total as f64 / (days_since_first / 365.0)
    } else {
        total as f64
    };
    put("inj_rate_per_year", Some(rate_per_year));

    if window_len > 0 {
        let k = window_len as f64;
        put("inj_rate_per_fixture_total", Some(total as f64 / k));
        put("inj_rate_per_fixture_6m", Some(count_6m as f64 / k));
    } else {
        put("inj_rate_per_fixture_total", None);
        put("inj_rate_per_fixture_6m", None);
    }

    out
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// Sample standard deviation (n - 1 denominator); undefined below two gaps.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}
