use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::api_client::ApiClient;
use crate::config::{PREV_SEASON, SEASON};
use crate::error::PredictError;

/// One fixture's named statistics for a single subject (player or team).
/// Absent statistics simply have no entry, so "unknown" stays distinct from
/// zero all the way into aggregation.
#[derive(Debug, Clone, Default)]
pub struct StatSnapshot {
    values: HashMap<String, f64>,
}

impl StatSnapshot {
    pub fn set(&mut self, name: &str, value: Option<f64>) {
        if let Some(v) = value {
            self.values.insert(name.to_string(), v);
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct InjuryEvent {
    pub date: NaiveDate,
    pub season: i32,
}

/// Flat previous-season per-player block used for the `prev_games_*`
/// features.
#[derive(Debug, Clone, Default)]
pub struct PrevSeasonStats {
    pub minutes: Option<f64>,
    pub rating: Option<f64>,
    pub position: Option<String>,
}

/// Numeric parse tolerant of the provider's mixed types: numbers, numeric
/// strings, and percentage strings like "58%".
pub fn loose_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }
}

/// Digit-only parse for biometric strings like "183 cm" / "79 kg".
pub fn digits_to_f64(raw: &str) -> Option<f64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Team-level statistics for one fixture. `Ok(None)` when the provider has no
/// block for the pair; only a total call failure is an error.
pub fn fixture_team_stats(
    client: &ApiClient,
    fixture_id: u64,
    team_id: u32,
) -> Result<Option<StatSnapshot>, PredictError> {
    let doc = client.call(
        "/fixtures/statistics",
        &[
            ("fixture", fixture_id.to_string()),
            ("team", team_id.to_string()),
        ],
    )?;
    let Some(raw) = doc
        .get("response")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|blk| blk.get("statistics"))
        .and_then(|v| v.as_array())
    else {
        return Ok(None);
    };

    let mut snap = StatSnapshot::default();
    for item in raw {
        let Some(kind) = item.get("type").and_then(|v| v.as_str()) else {
            continue;
        };
        let name = kind.to_lowercase().replace(' ', "_");
        let value = item.get("value").and_then(loose_f64);
        snap.set(&name, value);
    }
    if snap.is_empty() {
        return Ok(None);
    }
    Ok(Some(snap))
}

/// Per-player statistics within one fixture, flattened from the provider's
/// nested groups. The `/fixtures/players` document is fetched once per
/// fixture (client cache) and scanned per player.
pub fn fixture_player_stats(
    client: &ApiClient,
    fixture_id: u64,
    player_id: u64,
) -> Result<Option<StatSnapshot>, PredictError> {
    let doc = client.call("/fixtures/players", &[("fixture", fixture_id.to_string())])?;
    let Some(sides) = doc.get("response").and_then(|v| v.as_array()) else {
        return Ok(None);
    };

    for side in sides {
        let Some(players) = side.get("players").and_then(|v| v.as_array()) else {
            continue;
        };
        for entry in players {
            let id = entry
                .get("player")
                .and_then(|p| p.get("id"))
                .and_then(|v| v.as_u64());
            if id != Some(player_id) {
                continue;
            }
            let Some(stat) = entry
                .get("statistics")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
            else {
                continue;
            };
            return Ok(Some(flatten_player_fixture_stats(stat)));
        }
    }
    Ok(None)
}

fn flatten_player_fixture_stats(stat: &Value) -> StatSnapshot {
    let mut snap = StatSnapshot::default();
    let field = |group: &str, name: &str| -> Option<f64> {
        stat.get(group).and_then(|g| g.get(name)).and_then(loose_f64)
    };

    snap.set("games_minutes", field("games", "minutes"));
    snap.set("games_rating", field("games", "rating"));
    snap.set("shots_total", field("shots", "total"));
    snap.set("shots_on", field("shots", "on"));
    snap.set("goals_total", field("goals", "total"));
    snap.set("goals_assists", field("goals", "assists"));
    snap.set("fouls_committed", field("fouls", "committed"));
    snap.set("fouls_drawn", field("fouls", "drawn"));
    snap.set("cards_yellow", field("cards", "yellow"));
    snap.set("cards_red", field("cards", "red"));
    snap.set("duels_total", field("duels", "total"));
    snap.set("duels_won", field("duels", "won"));
    snap.set("passes_total", field("passes", "total"));
    snap.set("passes_key", field("passes", "key"));
    snap.set("passes_accuracy", field("passes", "accuracy"));
    snap.set("tackles_total", field("tackles", "total"));
    snap.set("tackles_blocks", field("tackles", "blocks"));
    snap.set("tackles_interceptions", field("tackles", "interceptions"));
    snap
}

/// Previous-season flat stats for one player (first statistics block).
pub fn prev_season_flat(
    client: &ApiClient,
    player_id: u64,
) -> Result<PrevSeasonStats, PredictError> {
    let doc = client.call(
        "/players",
        &[
            ("id", player_id.to_string()),
            ("season", PREV_SEASON.to_string()),
        ],
    )?;
    let Some(games) = doc
        .get("response")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|blk| blk.get("statistics"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|stat| stat.get("games"))
    else {
        return Ok(PrevSeasonStats::default());
    };

    Ok(PrevSeasonStats {
        minutes: games.get("minutes").and_then(loose_f64),
        rating: games.get("rating").and_then(loose_f64),
        position: games
            .get("position")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    })
}

/// Full injury history for a player over the current and previous season.
/// Events with unparseable dates are dropped rather than failing the run.
pub fn injury_log(client: &ApiClient, player_id: u64) -> Result<Vec<InjuryEvent>, PredictError> {
    let mut events = Vec::new();
    for season in [SEASON, PREV_SEASON] {
        let doc = client.call(
            "/injuries",
            &[
                ("player", player_id.to_string()),
                ("season", season.to_string()),
            ],
        )?;
        let Some(arr) = doc.get("response").and_then(|v| v.as_array()) else {
            continue;
        };
        for blk in arr {
            let Some(date) = blk
                .get("fixture")
                .and_then(|f| f.get("date"))
                .and_then(|v| v.as_str())
                .and_then(parse_provider_date)
            else {
                continue;
            };
            let season = blk
                .get("league")
                .and_then(|l| l.get("season"))
                .and_then(|v| v.as_i64())
                .unwrap_or(season as i64) as i32;
            events.push(InjuryEvent { date, season });
        }
    }
    Ok(events)
}

/// Provider timestamps look like "2024-03-01T18:00:00+00:00"; the date prefix
/// is all the injury features need.
pub fn parse_provider_date(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn loose_f64_accepts_numbers_strings_and_percentages() {
        assert_eq!(loose_f64(&json!(14)), Some(14.0));
        assert_eq!(loose_f64(&json!("7.2")), Some(7.2));
        assert_eq!(loose_f64(&json!("58%")), Some(58.0));
        assert_eq!(loose_f64(&json!(null)), None);
        assert_eq!(loose_f64(&json!("-")), None);
    }

    #[test]
    fn digits_to_f64_strips_units() {
        assert_eq!(digits_to_f64("183 cm"), Some(183.0));
        assert_eq!(digits_to_f64("79 kg"), Some(79.0));
        assert_eq!(digits_to_f64("unknown"), None);
    }

    #[test]
    fn flatten_keeps_absent_fields_absent() {
        let stat = json!({
            "games": {"minutes": 90, "rating": "7.4"},
            "shots": {"total": 3, "on": null},
            "passes": {"total": 41, "accuracy": "85%"},
        });
        let snap = flatten_player_fixture_stats(&stat);
        assert_eq!(snap.get("games_minutes"), Some(90.0));
        assert_eq!(snap.get("games_rating"), Some(7.4));
        assert_eq!(snap.get("shots_total"), Some(3.0));
        assert_eq!(snap.get("shots_on"), None);
        assert_eq!(snap.get("passes_accuracy"), Some(85.0));
        assert_eq!(snap.get("tackles_total"), None);
    }

    #[test]
    fn provider_dates_parse_by_prefix() {
        assert_eq!(
            parse_provider_date("2024-03-01T18:00:00+00:00"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_provider_date("bad"), None);
    }
}
