use std::collections::HashMap;

use crate::stats_fetch::StatSnapshot;

/// Partial feature contribution: name -> value, where `None` is the explicit
/// "unknown" sentinel (mapped to NaN only at the model boundary).
pub type FeatureMap = HashMap<String, Option<f64>>;

pub fn lookup(map: &FeatureMap, name: &str) -> Option<f64> {
    map.get(name).copied().flatten()
}

/// Sum over present values only; an all-absent window yields the sentinel,
/// never zero.
pub fn sum_present(values: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut seen = false;
    for v in values.iter().flatten() {
        sum += v;
        seen = true;
    }
    seen.then_some(sum)
}

/// Arithmetic mean ignoring absent entries; all-absent yields the sentinel.
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.iter().flatten() {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

/// Numerator over denominator, defined only for a present, strictly positive
/// denominator. Never divides by zero.
pub fn safe_ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

fn column(window: &[Option<StatSnapshot>], stat: &str) -> Vec<Option<f64>> {
    window
        .iter()
        .map(|snap| snap.as_ref().and_then(|s| s.get(stat)))
        .collect()
}

const PLAYER_SUMS: &[(&str, &str)] = &[
    ("player_shots_total_5", "shots_total"),
    ("player_shots_on_5", "shots_on"),
    ("player_goals_5", "goals_total"),
    ("player_assists_5", "goals_assists"),
    ("player_fouls_committed_5", "fouls_committed"),
    ("player_fouls_drawn_5", "fouls_drawn"),
    ("player_yellow_cards_5", "cards_yellow"),
    ("player_red_cards_5", "cards_red"),
    ("player_duels_total_5", "duels_total"),
    ("player_duels_won_5", "duels_won"),
    ("player_passes_total_5", "passes_total"),
    ("player_passes_key_5", "passes_key"),
    ("player_tackles_total_5", "tackles_total"),
    ("player_tackles_blocks_5", "tackles_blocks"),
    ("player_tackles_interceptions_5", "tackles_interceptions"),
];

/// Reduce a player's fixture window to its summary features.
pub fn aggregate_player_stats(window: &[Option<StatSnapshot>]) -> FeatureMap {
    let mut out = FeatureMap::new();
    for (feature, stat) in PLAYER_SUMS {
        out.insert((*feature).to_string(), sum_present(&column(window, stat)));
    }
    out.insert(
        "player_minutes_avg_5".to_string(),
        mean_present(&column(window, "games_minutes")),
    );
    out.insert(
        "player_rating_avg_5".to_string(),
        mean_present(&column(window, "games_rating")),
    );
    out.insert(
        "player_duels_win_ratio_5".to_string(),
        safe_ratio(
            sum_present(&column(window, "duels_won")),
            sum_present(&column(window, "duels_total")),
        ),
    );
    out.insert(
        "player_pass_acc_mean_5".to_string(),
        mean_present(&column(window, "passes_accuracy")),
    );
    out
}

const SIDE_SUMS: &[(&str, &str)] = &[
    ("shots_on_goal_5", "shots_on_goal"),
    ("shots_off_goal_5", "shots_off_goal"),
    ("total_shots_5", "total_shots"),
    ("fouls_5", "fouls"),
    ("corners_5", "corner_kicks"),
    ("offsides_5", "offsides"),
    ("yellow_cards_5", "yellow_cards"),
    ("red_cards_5", "red_cards"),
    ("passes_5", "total_passes"),
    ("passes_acc_5", "passes_accurate"),
];

/// Team-level window reduction. The same shape serves both sides: prefix
/// "team" for the squad's own fixtures, "opp" for the opponent's.
pub fn aggregate_side_stats(prefix: &str, window: &[Option<StatSnapshot>]) -> FeatureMap {
    let mut out = FeatureMap::new();
    for (suffix, stat) in SIDE_SUMS {
        out.insert(
            format!("{prefix}_{suffix}"),
            sum_present(&column(window, stat)),
        );
    }
    out.insert(
        format!("{prefix}_ball_poss_avg_5"),
        mean_present(&column(window, "ball_possession")),
    );
    let passes = lookup(&out, &format!("{prefix}_passes_5"));
    let accurate = lookup(&out, &format!("{prefix}_passes_acc_5"));
    out.insert(
        format!("{prefix}_pass_acc_ratio_5"),
        safe_ratio(accurate, passes),
    );
    out
}

const CROSS_PAIRS: &[(&str, &str)] = &[
    ("shots", "total_shots_5"),
    ("sog", "shots_on_goal_5"),
    ("fouls", "fouls_5"),
    ("corners", "corners_5"),
    ("offsides", "offsides_5"),
    ("poss", "ball_poss_avg_5"),
    ("pass_acc", "pass_acc_ratio_5"),
];

/// Paired team-vs-opponent diffs and ratios. A diff needs both operands
/// present; a ratio additionally needs a non-zero opponent value.
pub fn team_vs_opp_features(team: &FeatureMap, opp: &FeatureMap) -> FeatureMap {
    let mut out = FeatureMap::new();
    for (short, metric) in CROSS_PAIRS {
        let t = lookup(team, &format!("team_{metric}"));
        let o = lookup(opp, &format!("opp_{metric}"));
        let diff = match (t, o) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
        let ratio = match (t, o) {
            (Some(a), Some(b)) if b != 0.0 => Some(a / b),
            _ => None,
        };
        out.insert(format!("team_vs_opp_{short}_diff_5"), diff);
        out.insert(format!("team_vs_opp_{short}_ratio_5"), ratio);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(pairs: &[(&str, f64)]) -> Option<StatSnapshot> {
        let mut s = StatSnapshot::default();
        for (k, v) in pairs {
            s.set(k, Some(*v));
        }
        Some(s)
    }

    #[test]
    fn sum_skips_absent_entries() {
        assert_eq!(sum_present(&[None, Some(3.0), None, Some(5.0)]), Some(8.0));
        assert_eq!(sum_present(&[Some(0.0), None]), Some(0.0));
    }

    #[test]
    fn all_absent_window_sums_to_sentinel_not_zero() {
        assert_eq!(sum_present(&[None, None, None]), None);
        assert_eq!(mean_present(&[None, None]), None);
    }

    #[test]
    fn ratio_never_divides_by_zero() {
        assert_eq!(safe_ratio(Some(4.0), Some(0.0)), None);
        assert_eq!(safe_ratio(Some(4.0), None), None);
        assert_eq!(safe_ratio(None, Some(2.0)), None);
        assert_eq!(safe_ratio(Some(4.0), Some(8.0)), Some(0.5));
    }

    #[test]
    fn player_window_sums_only_present_fixtures() {
        let window = vec![
            None,
            snap(&[("shots_total", 3.0), ("games_minutes", 90.0)]),
            None,
            snap(&[("shots_total", 5.0), ("games_minutes", 45.0)]),
        ];
        let feats = aggregate_player_stats(&window);
        assert_eq!(lookup(&feats, "player_shots_total_5"), Some(8.0));
        assert_eq!(lookup(&feats, "player_minutes_avg_5"), Some(67.5));
        // Nothing emitted duels, so both the sum and the ratio are unknown.
        assert_eq!(lookup(&feats, "player_duels_total_5"), None);
        assert_eq!(lookup(&feats, "player_duels_win_ratio_5"), None);
    }

    #[test]
    fn duel_ratio_requires_positive_total() {
        let window = vec![snap(&[("duels_total", 0.0), ("duels_won", 0.0)])];
        let feats = aggregate_player_stats(&window);
        assert_eq!(lookup(&feats, "player_duels_win_ratio_5"), None);

        let window = vec![snap(&[("duels_total", 10.0), ("duels_won", 6.0)])];
        let feats = aggregate_player_stats(&window);
        assert_eq!(lookup(&feats, "player_duels_win_ratio_5"), Some(0.6));
    }

    #[test]
    fn side_aggregation_and_pass_accuracy() {
        let window = vec![
            snap(&[
                ("total_shots", 12.0),
                ("total_passes", 400.0),
                ("passes_accurate", 320.0),
                ("ball_possession", 60.0),
            ]),
            snap(&[
                ("total_shots", 8.0),
                ("total_passes", 100.0),
                ("passes_accurate", 80.0),
                ("ball_possession", 40.0),
            ]),
        ];
        let feats = aggregate_side_stats("team", &window);
        assert_eq!(lookup(&feats, "team_total_shots_5"), Some(20.0));
        assert_eq!(lookup(&feats, "team_ball_poss_avg_5"), Some(50.0));
        assert_eq!(lookup(&feats, "team_pass_acc_ratio_5"), Some(0.8));
    }

    #[test]
    fn cross_features_respect_absent_and_zero_opponents() {
        let mut team = FeatureMap::new();
        team.insert("team_total_shots_5".to_string(), Some(20.0));
        team.insert("team_fouls_5".to_string(), Some(10.0));
        let mut opp = FeatureMap::new();
        opp.insert("opp_total_shots_5".to_string(), Some(0.0));
        opp.insert("opp_fouls_5".to_string(), None);

        let cross = team_vs_opp_features(&team, &opp);
        // Zero opponent shots: diff is defined, ratio is not.
        assert_eq!(lookup(&cross, "team_vs_opp_shots_diff_5"), Some(20.0));
        assert_eq!(lookup(&cross, "team_vs_opp_shots_ratio_5"), None);
        // Absent opponent fouls: neither is defined.
        assert_eq!(lookup(&cross, "team_vs_opp_fouls_diff_5"), None);
        assert_eq!(lookup(&cross, "team_vs_opp_fouls_ratio_5"), None);
    }
}
