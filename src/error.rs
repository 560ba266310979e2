use std::path::PathBuf;

use thiserror::Error;

/// Fatal failure modes of a prediction run. Per-statistic absence is never an
/// error; it degrades to an absent feature value instead.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Team name not present in the reference table. Raised before any
    /// network work starts.
    #[error("unknown team name: {0}")]
    UnknownTeam(String),

    /// Retry budget exhausted (or non-retryable failure) on a required call.
    #[error("data source unavailable for {endpoint}: {reason}")]
    DataSourceUnavailable { endpoint: String, reason: String },

    /// Schema, model, encoder or reference file absent or malformed at
    /// startup.
    #[error("missing or malformed artifact {path}: {reason}")]
    MissingArtifact { path: PathBuf, reason: String },

    /// The roster endpoint returned no players for the home team.
    #[error("no squad found for team {0}")]
    EmptySquad(String),
}

impl PredictError {
    pub fn missing_artifact(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::MissingArtifact {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
