//! Prediction adapter over the pre-trained emission regression model.
//!
//! The artifact is a JSON file produced by the offline training job: feature
//! names, an intercept, and one coefficient per feature. Training itself is
//! out of scope here; this module only loads and evaluates the weights.

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::schema::Channel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized regression weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Feature names in training order; checked against the schema on load.
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

/// Model errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to load model artifact: {0}")]
    Load(String),
    #[error("model schema mismatch: {0}")]
    Schema(String),
    #[error("prediction failed: {0}")]
    Predict(String),
}

/// The seam the stream loop and query handlers depend on.
pub trait Predictor {
    /// Predict the emission scalar for a normalized feature vector.
    ///
    /// Deterministic: identical input and weights give an identical result.
    fn predict(&self, vector: &FeatureVector) -> Result<f64, ModelError>;
}

/// Linear regression model loaded once at startup.
#[derive(Debug, Clone)]
pub struct EmissionModel {
    intercept: f64,
    coefficients: [f64; FEATURE_COUNT],
}

impl EmissionModel {
    /// Load the model from its artifact file.
    ///
    /// Absence or a schema mismatch is fatal; the process must not serve
    /// predictions without a valid model.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))?;
        let artifact: ModelArtifact =
            serde_json::from_str(&content).map_err(|e| ModelError::Load(e.to_string()))?;
        Self::from_artifact(artifact)
    }

    /// Build a model from an in-memory artifact, validating its shape.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let expected = expected_feature_names();
        if artifact.feature_names != expected {
            return Err(ModelError::Schema(format!(
                "artifact features {:?} do not match the sensor schema",
                artifact.feature_names
            )));
        }
        let coefficients: [f64; FEATURE_COUNT] =
            artifact.coefficients.as_slice().try_into().map_err(|_| {
                ModelError::Schema(format!(
                    "expected {FEATURE_COUNT} coefficients, got {}",
                    artifact.coefficients.len()
                ))
            })?;
        if !artifact.intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Schema("non-finite model weights".to_string()));
        }
        Ok(Self {
            intercept: artifact.intercept,
            coefficients,
        })
    }

    /// Export the weights back to an artifact, e.g. for `config` display.
    pub fn to_artifact(&self) -> ModelArtifact {
        ModelArtifact {
            feature_names: expected_feature_names(),
            intercept: self.intercept,
            coefficients: self.coefficients.to_vec(),
        }
    }
}

impl Predictor for EmissionModel {
    fn predict(&self, vector: &FeatureVector) -> Result<f64, ModelError> {
        let value = self
            .coefficients
            .iter()
            .zip(vector.values())
            .fold(self.intercept, |acc, (c, v)| acc + c * v);
        if !value.is_finite() {
            return Err(ModelError::Predict(
                "model produced a non-finite value".to_string(),
            ));
        }
        Ok(value)
    }
}

/// Feature names in training order: the date column, then the channels.
pub fn expected_feature_names() -> Vec<String> {
    std::iter::once("From Date".to_string())
        .chain(Channel::ALL.iter().map(|c| c.label().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::normalize;
    use crate::schema::Sample;
    use std::collections::HashMap;

    fn test_artifact() -> ModelArtifact {
        ModelArtifact {
            feature_names: expected_feature_names(),
            intercept: 1.5,
            coefficients: vec![0.1; FEATURE_COUNT],
        }
    }

    #[test]
    fn test_load_missing_artifact_fails() {
        let err = EmissionModel::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, ModelError::Load(_)));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut artifact = test_artifact();
        artifact.feature_names.swap(1, 2);
        assert!(matches!(
            EmissionModel::from_artifact(artifact),
            Err(ModelError::Schema(_))
        ));

        let mut artifact = test_artifact();
        artifact.coefficients.pop();
        assert!(matches!(
            EmissionModel::from_artifact(artifact),
            Err(ModelError::Schema(_))
        ));
    }

    #[test]
    fn test_predict_is_deterministic() {
        let model = EmissionModel::from_artifact(test_artifact()).unwrap();
        let vector = normalize(&Sample::new(HashMap::new()));

        let first = model.predict(&vector).unwrap();
        for _ in 0..10 {
            assert_eq!(model.predict(&vector).unwrap(), first);
        }
    }

    #[test]
    fn test_predict_linear_form() {
        let model = EmissionModel::from_artifact(test_artifact()).unwrap();
        let vector = FeatureVector::from_values([2.0; FEATURE_COUNT]);
        let expected = 1.5 + 0.1 * 2.0 * FEATURE_COUNT as f64;
        assert!((model.predict(&vector).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_result_is_error() {
        let model = EmissionModel::from_artifact(test_artifact()).unwrap();
        let vector = FeatureVector::from_values([f64::MAX; FEATURE_COUNT]);
        assert!(matches!(
            model.predict(&vector),
            Err(ModelError::Predict(_))
        ));
    }
}
