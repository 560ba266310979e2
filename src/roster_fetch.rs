use crate::api_client::ApiClient;
use crate::config::SEASON;
use crate::error::PredictError;
use crate::stats_fetch::digits_to_f64;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u64,
    pub name: String,
    pub age: Option<f64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

/// Current squad for a team, paginated until the first empty page.
pub fn get_squad(client: &ApiClient, team_id: u32) -> Result<Vec<Player>, PredictError> {
    let mut squad = Vec::new();
    let mut page = 1u32;
    loop {
        let doc = client.call(
            "/players",
            &[
                ("team", team_id.to_string()),
                ("season", SEASON.to_string()),
                ("page", page.to_string()),
            ],
        )?;
        let Some(arr) = doc.get("response").and_then(|v| v.as_array()) else {
            break;
        };
        if arr.is_empty() {
            break;
        }
        for blk in arr {
            let Some(p) = blk.get("player") else {
                continue;
            };
            let Some(id) = p.get("id").and_then(|v| v.as_u64()) else {
                continue;
            };
            squad.push(Player {
                id,
                name: p
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                age: p.get("age").and_then(|v| v.as_f64()),
                height_cm: p
                    .get("height")
                    .and_then(|v| v.as_str())
                    .and_then(digits_to_f64),
                weight_kg: p
                    .get("weight")
                    .and_then(|v| v.as_str())
                    .and_then(digits_to_f64),
            });
        }
        page += 1;
    }
    Ok(squad)
}

/// The K most recent completed fixtures before `date_iso`, newest first.
/// Equal-date ties keep provider order (stable sort, no secondary key).
pub fn fixtures_before(
    client: &ApiClient,
    team_id: u32,
    date_iso: &str,
    k: usize,
) -> Result<Vec<u64>, PredictError> {
    let doc = client.call(
        "/fixtures",
        &[
            ("team", team_id.to_string()),
            ("season", SEASON.to_string()),
            ("to", date_iso.to_string()),
            ("status", "FT".to_string()),
        ],
    )?;

    let mut pairs: Vec<(String, u64)> = Vec::new();
    if let Some(arr) = doc.get("response").and_then(|v| v.as_array()) {
        for item in arr {
            let Some(fixture) = item.get("fixture") else {
                continue;
            };
            let Some(id) = fixture.get("id").and_then(|v| v.as_u64()) else {
                continue;
            };
            let date = fixture
                .get("date")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            pairs.push((date, id));
        }
    }
    pairs.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(pairs.into_iter().take(k).map(|(_, id)| id).collect())
}
