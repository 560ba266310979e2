use std::env;
use std::path::PathBuf;

pub const BASE_URL: &str = "https://v3.football.api-sports.io";
pub const API_HOST: &str = "v3.football.api-sports.io";

pub const SEASON: i32 = 2024;
pub const PREV_SEASON: i32 = SEASON - 1;

/// Lookback horizon: the K most recent completed fixtures.
pub const NUM_FIXTURES: usize = 5;

pub const MAX_RETRY: u32 = 6;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Bootstrap confidence-interval cut points (percentiles). Must match what
/// was used when the model artifacts were created.
pub const CI_LOW: f64 = 2.5;
pub const CI_HIGH: f64 = 97.5;

pub fn api_key() -> Option<String> {
    env::var("FOOTBALL_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty())
}

pub fn teams_table_path() -> PathBuf {
    path_from_env("RISKCAST_TEAMS_CSV", "teams_2024.csv")
}

pub fn position_encoder_path() -> PathBuf {
    path_from_env("RISKCAST_POSITION_ENCODER", "prev_games_position_encoder.json")
}

pub fn model_dir() -> PathBuf {
    path_from_env("RISKCAST_MODEL_DIR", "bootstrap_models")
}

fn path_from_env(var: &str, default: &str) -> PathBuf {
    env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
