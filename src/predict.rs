use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;

use crate::aggregate::{
    self, FeatureMap, aggregate_player_stats, aggregate_side_stats, team_vs_opp_features,
};
use crate::api_client::ApiClient;
use crate::config::{NUM_FIXTURES, SEASON};
use crate::ensemble::BootstrapEnsemble;
use crate::error::PredictError;
use crate::injury_features::injury_history_features;
use crate::reconcile::{PlayerContributions, reconcile};
use crate::reference::{PositionEncoder, TeamTable};
use crate::roster_fetch::{self, Player};
use crate::stats_fetch::{self, StatSnapshot};

/// Final per-player output record: point estimate, interval, and the
/// biographical snapshot taken at roster-fetch time.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub player_id: u64,
    pub player_name: String,
    pub age: Option<f64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub position: Option<String>,
    pub last_rating: Option<f64>,
    pub probability: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// The assembled pipeline. Reference data and the ensemble are loaded once
/// and shared read-only across the per-player fan-out; the client's response
/// cache is the only shared mutable state.
pub struct Predictor {
    client: ApiClient,
    teams: TeamTable,
    encoder: PositionEncoder,
    ensemble: BootstrapEnsemble,
}

impl Predictor {
    pub fn new(
        client: ApiClient,
        teams: TeamTable,
        encoder: PositionEncoder,
        ensemble: BootstrapEnsemble,
    ) -> Self {
        Self {
            client,
            teams,
            encoder,
            ensemble,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Injury-risk probabilities with bootstrap intervals for every member of
    /// the home squad ahead of the given fixture date.
    pub fn predict_match_risk(
        &self,
        home_team: &str,
        away_team: &str,
        reference: NaiveDate,
    ) -> Result<Vec<PredictionResult>, PredictError> {
        // Both names must resolve before any network work starts.
        let home_id = self.teams.id_of(home_team)?;
        let away_id = self.teams.id_of(away_team)?;
        let date_iso = reference.format("%Y-%m-%d").to_string();

        let squad = roster_fetch::get_squad(&self.client, home_id)?;
        if squad.is_empty() {
            return Err(PredictError::EmptySquad(home_team.to_string()));
        }
        let home_fixtures =
            roster_fetch::fixtures_before(&self.client, home_id, &date_iso, NUM_FIXTURES)?;
        let away_fixtures =
            roster_fetch::fixtures_before(&self.client, away_id, &date_iso, NUM_FIXTURES)?;

        // Team and opponent windows are shared by every player row.
        let home_window = self.team_window(&home_fixtures, home_id)?;
        let away_window = self.team_window(&away_fixtures, away_id)?;
        let team_feats = aggregate_side_stats("team", &home_window);
        let opp_feats = aggregate_side_stats("opp", &away_window);
        let cross_feats = team_vs_opp_features(&team_feats, &opp_feats);

        let shared = SharedFeatures {
            team: &team_feats,
            opp: &opp_feats,
            cross: &cross_feats,
            fixtures: &home_fixtures,
            reference,
        };

        let contributions: Vec<PlayerContributions> = squad
            .par_iter()
            .map(|player| self.build_player_row(player, &shared))
            .collect::<Result<_, PredictError>>()?;

        let matrix: Vec<Vec<f64>> = contributions
            .iter()
            .map(|contrib| reconcile(self.ensemble.schema(), contrib, &self.encoder))
            .collect();
        let estimates = self.ensemble.predict(&matrix);

        let results = squad
            .iter()
            .zip(&contributions)
            .zip(&estimates)
            .map(|((player, contrib), est)| PredictionResult {
                player_id: player.id,
                player_name: player.name.clone(),
                age: player.age,
                height_cm: player.height_cm,
                weight_kg: player.weight_kg,
                position: contrib.position.clone(),
                last_rating: aggregate::lookup(&contrib.numeric, "player_rating_avg_5"),
                probability: est.mean,
                ci_lower: est.lower,
                ci_upper: est.upper,
            })
            .collect();
        Ok(results)
    }

    fn team_window(
        &self,
        fixtures: &[u64],
        team_id: u32,
    ) -> Result<Vec<Option<StatSnapshot>>, PredictError> {
        fixtures
            .iter()
            .map(|fid| stats_fetch::fixture_team_stats(&self.client, *fid, team_id))
            .collect()
    }

    fn build_player_row(
        &self,
        player: &Player,
        shared: &SharedFeatures<'_>,
    ) -> Result<PlayerContributions, PredictError> {
        let mut numeric = FeatureMap::new();
        numeric.insert("player_id".to_string(), Some(player.id as f64));
        numeric.insert("prev_player_age".to_string(), player.age);
        numeric.insert("prev_player_height".to_string(), player.height_cm);
        numeric.insert("prev_player_weight".to_string(), player.weight_kg);

        let prev = stats_fetch::prev_season_flat(&self.client, player.id)?;
        numeric.insert("prev_games_minutes".to_string(), prev.minutes);
        numeric.insert("prev_games_rating".to_string(), prev.rating);

        let window: Vec<Option<StatSnapshot>> = shared
            .fixtures
            .iter()
            .map(|fid| stats_fetch::fixture_player_stats(&self.client, *fid, player.id))
            .collect::<Result<_, PredictError>>()?;
        numeric.extend(aggregate_player_stats(&window));

        numeric.extend(shared.team.clone());
        numeric.extend(shared.opp.clone());
        numeric.extend(shared.cross.clone());

        let history = stats_fetch::injury_log(&self.client, player.id)?;
        numeric.extend(injury_history_features(
            &history,
            shared.reference,
            shared.fixtures.len(),
            SEASON,
        ));

        Ok(PlayerContributions {
            numeric,
            position: prev.position,
        })
    }
}

struct SharedFeatures<'a> {
    team: &'a FeatureMap,
    opp: &'a FeatureMap,
    cross: &'a FeatureMap,
    fixtures: &'a [u64],
    reference: NaiveDate,
}

/// Deterministic output file name for a fixture's risk table.
pub fn risk_csv_name(home_team: &str, away_team: &str) -> String {
    format!(
        "risk_{}_vs_{}.csv",
        home_team.replace(' ', "_"),
        away_team.replace(' ', "_")
    )
}

pub fn write_risk_csv(path: &Path, rows: &[PredictionResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    writer.write_record([
        "player_id",
        "player_name",
        "age",
        "height_cm",
        "weight_kg",
        "position",
        "last_rating",
        "inj_probability",
        "ci_lower_95",
        "ci_upper_95",
    ])?;
    for row in rows {
        writer.write_record([
            row.player_id.to_string(),
            row.player_name.clone(),
            fmt_opt(row.age),
            fmt_opt(row.height_cm),
            fmt_opt(row.weight_kg),
            row.position.clone().unwrap_or_default(),
            fmt_opt(row.last_rating),
            format!("{:.6}", row.probability),
            format!("{:.6}", row.ci_lower),
            format!("{:.6}", row.ci_upper),
        ])?;
    }
    writer.flush().context("flush risk csv")?;
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_name_replaces_spaces() {
        assert_eq!(
            risk_csv_name("Al Hilal", "Al Nassr"),
            "risk_Al_Hilal_vs_Al_Nassr.csv"
        );
    }
}
