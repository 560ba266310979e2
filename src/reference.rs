use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::PredictError;

/// Reserved encoder entry used for unseen or missing position labels.
pub const FALLBACK_POSITION: &str = "None";

/// Static team-name -> team-id table, loaded once per process.
#[derive(Debug)]
pub struct TeamTable {
    by_name: HashMap<String, u32>,
}

#[derive(Debug, Deserialize)]
struct TeamRow {
    team_name: String,
    team_id: u32,
}

impl TeamTable {
    pub fn load(path: &Path) -> Result<Self, PredictError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|err| PredictError::missing_artifact(path, err))?;
        let mut by_name = HashMap::new();
        for row in reader.deserialize::<TeamRow>() {
            let row = row.map_err(|err| PredictError::missing_artifact(path, err))?;
            by_name.insert(row.team_name, row.team_id);
        }
        if by_name.is_empty() {
            return Err(PredictError::missing_artifact(path, "no team rows"));
        }
        Ok(Self { by_name })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, u32)>) -> Self {
        Self {
            by_name: entries.into_iter().collect(),
        }
    }

    pub fn id_of(&self, name: &str) -> Result<u32, PredictError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| PredictError::UnknownTeam(name.to_string()))
    }
}

/// Fixed categorical position encoder fitted at training time. Immutable for
/// the process lifetime.
pub struct PositionEncoder {
    codes: HashMap<String, i64>,
    fallback: i64,
}

impl PositionEncoder {
    pub fn load(path: &Path) -> Result<Self, PredictError> {
        let raw =
            fs::read_to_string(path).map_err(|err| PredictError::missing_artifact(path, err))?;
        let codes: HashMap<String, i64> =
            serde_json::from_str(&raw).map_err(|err| PredictError::missing_artifact(path, err))?;
        Self::from_codes(codes).ok_or_else(|| {
            PredictError::missing_artifact(path, format!("no \"{FALLBACK_POSITION}\" entry"))
        })
    }

    pub fn from_codes(codes: HashMap<String, i64>) -> Option<Self> {
        let fallback = codes.get(FALLBACK_POSITION).copied()?;
        Some(Self { codes, fallback })
    }

    pub fn encode(&self, label: Option<&str>) -> i64 {
        label
            .and_then(|l| self.codes.get(l).copied())
            .unwrap_or(self.fallback)
    }
}
