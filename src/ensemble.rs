use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{CI_HIGH, CI_LOW};
use crate::error::PredictError;
use crate::reconcile::FeatureSchema;

/// One fitted bootstrap member: a standardized linear scorer with a sigmoid
/// link. NaN inputs are imputed to the training-time feature mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModel {
    #[serde(default)]
    pub feature_means: Vec<f64>,
    #[serde(default)]
    pub feature_stds: Vec<f64>,
    #[serde(default)]
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl RiskModel {
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut z = self.intercept;
        for (idx, coeff) in self.coeffs.iter().enumerate() {
            let Some(&raw) = row.get(idx) else { break };
            let mean = self.feature_means.get(idx).copied().unwrap_or(0.0);
            let raw = if raw.is_nan() { mean } else { raw };
            let std = self
                .feature_stds
                .get(idx)
                .copied()
                .unwrap_or(1.0)
                .max(1e-6);
            z += coeff * ((raw - mean) / std);
        }
        sigmoid(z)
    }
}

#[derive(Debug, Deserialize)]
struct EnsembleMetadata {
    feature_cols: Vec<String>,
    model_files: Vec<String>,
}

/// Per-player ensemble summary: bootstrap mean and percentile interval.
#[derive(Debug, Clone, Copy)]
pub struct RiskEstimate {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Ordered collection of interchangeable bootstrap members sharing one
/// feature schema. Loaded once, immutable for the run.
#[derive(Debug)]
pub struct BootstrapEnsemble {
    models: Vec<RiskModel>,
    schema: FeatureSchema,
}

impl BootstrapEnsemble {
    /// Loads `metadata.json` plus every listed model file from `dir`.
    pub fn load(dir: &Path) -> Result<Self, PredictError> {
        let meta_path = dir.join("metadata.json");
        let raw = fs::read_to_string(&meta_path)
            .map_err(|err| PredictError::missing_artifact(&meta_path, err))?;
        let meta: EnsembleMetadata = serde_json::from_str(&raw)
            .map_err(|err| PredictError::missing_artifact(&meta_path, err))?;
        if meta.model_files.is_empty() {
            return Err(PredictError::missing_artifact(
                &meta_path,
                "no model files listed",
            ));
        }

        let mut models = Vec::with_capacity(meta.model_files.len());
        for file in &meta.model_files {
            let path = dir.join(file);
            let raw = fs::read_to_string(&path)
                .map_err(|err| PredictError::missing_artifact(&path, err))?;
            let model: RiskModel = serde_json::from_str(&raw)
                .map_err(|err| PredictError::missing_artifact(&path, err))?;
            models.push(model);
        }

        Ok(Self {
            models,
            schema: FeatureSchema::new(meta.feature_cols),
        })
    }

    pub fn from_parts(models: Vec<RiskModel>, schema: FeatureSchema) -> Self {
        Self { models, schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn size(&self) -> usize {
        self.models.len()
    }

    /// Runs every member over the matrix (rows = players, columns in schema
    /// order) and reduces each player's probability spread.
    pub fn predict(&self, matrix: &[Vec<f64>]) -> Vec<RiskEstimate> {
        matrix
            .iter()
            .map(|row| {
                let probs: Vec<f64> = self.models.iter().map(|m| m.predict_proba(row)).collect();
                summarize(&probs)
            })
            .collect()
    }
}

fn summarize(probs: &[f64]) -> RiskEstimate {
    if probs.is_empty() {
        return RiskEstimate {
            mean: f64::NAN,
            lower: f64::NAN,
            upper: f64::NAN,
        };
    }
    let mean = probs.iter().sum::<f64>() / probs.len() as f64;
    let mut sorted = probs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    RiskEstimate {
        mean,
        lower: percentile(&sorted, CI_LOW),
        upper: percentile(&sorted, CI_HIGH),
    }
}

/// Percentile over an ascending-sorted slice with linear interpolation
/// between order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logit(p: f64) -> f64 {
        (p / (1.0 - p)).ln()
    }

    fn constant_model(p: f64) -> RiskModel {
        RiskModel {
            feature_means: Vec::new(),
            feature_stds: Vec::new(),
            coeffs: Vec::new(),
            intercept: logit(p),
        }
    }

    #[test]
    fn fifty_constant_members_collapse_the_interval() {
        let models = (0..50).map(|_| constant_model(0.37)).collect();
        let ensemble =
            BootstrapEnsemble::from_parts(models, FeatureSchema::new(vec!["x".to_string()]));
        let out = ensemble.predict(&[vec![1.0]]);
        assert_eq!(out.len(), 1);
        assert!((out[0].mean - 0.37).abs() < 1e-12);
        assert!((out[0].lower - 0.37).abs() < 1e-12);
        assert!((out[0].upper - 0.37).abs() < 1e-12);
    }

    #[test]
    fn spread_members_produce_an_ordered_interval() {
        let models = vec![
            constant_model(0.10),
            constant_model(0.20),
            constant_model(0.30),
            constant_model(0.40),
        ];
        let ensemble =
            BootstrapEnsemble::from_parts(models, FeatureSchema::new(vec!["x".to_string()]));
        let out = ensemble.predict(&[vec![0.0]]);
        let est = out[0];
        assert!((est.mean - 0.25).abs() < 1e-12);
        assert!(est.lower <= est.mean && est.mean <= est.upper);
        assert!(est.lower >= 0.10 && est.upper <= 0.40);
    }

    #[test]
    fn nan_features_are_mean_imputed() {
        let model = RiskModel {
            feature_means: vec![2.0],
            feature_stds: vec![1.0],
            coeffs: vec![1.0],
            intercept: 0.0,
        };
        // NaN standardizes to the mean, i.e. contributes zero signal.
        let p_nan = model.predict_proba(&[f64::NAN]);
        let p_mean = model.predict_proba(&[2.0]);
        assert!((p_nan - p_mean).abs() < 1e-12);
        assert!((p_nan - 0.5).abs() < 1e-12);
        assert!(model.predict_proba(&[3.0]) > 0.5);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&xs, 0.0), 1.0);
        assert_eq!(percentile(&xs, 100.0), 4.0);
        assert!((percentile(&xs, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&xs, 2.5) - 1.075).abs() < 1e-12);
    }

    #[test]
    fn missing_metadata_is_a_startup_error() {
        let err = BootstrapEnsemble::load(Path::new("no_such_dir")).unwrap_err();
        assert!(matches!(err, PredictError::MissingArtifact { .. }));
    }
}
