use crate::aggregate::FeatureMap;
use crate::reference::PositionEncoder;

/// Name of the single categorical column in the trained feature set.
pub const POSITION_FEATURE: &str = "prev_games_position";

/// Externally defined, ordered list of feature names the ensemble expects.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// All partial feature contributions for one player. The raw position label
/// is kept beside the numeric map for display; only its encoded form enters
/// the matrix.
#[derive(Debug, Clone, Default)]
pub struct PlayerContributions {
    pub numeric: FeatureMap,
    pub position: Option<String>,
}

/// Merge the contributions into one row in exact schema order. Schema names
/// missing from the contributions become NaN; contributed names outside the
/// schema are dropped.
pub fn reconcile(
    schema: &FeatureSchema,
    contrib: &PlayerContributions,
    encoder: &PositionEncoder,
) -> Vec<f64> {
    schema
        .names()
        .iter()
        .map(|name| {
            if name.as_str() == POSITION_FEATURE {
                return encoder.encode(contrib.position.as_deref()) as f64;
            }
            contrib
                .numeric
                .get(name)
                .copied()
                .flatten()
                .unwrap_or(f64::NAN)
        })
        .collect()
}
