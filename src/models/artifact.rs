//! Артефакт модели: scaler и модель из одного запуска обучения

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::linear::{Model, TrainedModel};
use crate::preprocessing::FittedScaler;
use crate::storage::BlobStore;
use crate::types::{FeatureMatrix, Metrics, ModelInfo, ModelParameters};

const FORMAT_VERSION: u32 = 1;
pub const MODEL_TYPE: &str = "Linear Regression";

/// Пара scaler + модель. Поля не изменяются по отдельности:
/// новая пара создается только новым запуском обучения.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    trained_at: DateTime<Utc>,
    scaler: FittedScaler,
    model: Model,
    metrics: Metrics,
}

impl ModelArtifact {
    pub fn new(scaler: FittedScaler, trained: TrainedModel) -> Result<Self> {
        let artifact = Self {
            format_version: FORMAT_VERSION,
            trained_at: Utc::now(),
            scaler,
            model: trained.model,
            metrics: trained.metrics,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(PipelineError::schema(format!(
                "unsupported artifact format version {}",
                self.format_version
            )));
        }
        self.scaler.validate()?;
        self.model.validate()?;
        if self.scaler.features() != self.model.features() {
            return Err(PipelineError::schema(format!(
                "scaler features {:?} do not match model features {:?}",
                self.scaler.features(),
                self.model.features()
            )));
        }
        Ok(())
    }

    pub fn scaler(&self) -> &FittedScaler {
        &self.scaler
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Стандартизация и предсказание одной и той же парой
    pub fn predict(&self, features: &FeatureMatrix) -> Result<ndarray::Array1<f64>> {
        let scaled = self.scaler.apply(features)?;
        self.model.predict(&scaled)
    }

    pub fn describe(&self) -> ModelInfo {
        ModelInfo {
            model_type: MODEL_TYPE.to_string(),
            features: self.scaler.features().to_vec(),
            model_parameters: ModelParameters {
                coefficients: self.model.coefficients().to_vec(),
                intercept: self.model.intercept(),
            },
            trained_at: self.trained_at,
            metrics: self.metrics,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn save(&self, store: &dyn BlobStore, name: &str) -> Result<()> {
        store.write_blob(name, &self.to_bytes()?)?;
        tracing::info!(blob = %name, "Model artifact saved");
        Ok(())
    }

    pub fn load(store: &dyn BlobStore, name: &str) -> Result<Self> {
        let bytes = store.read_blob(name)?;
        let artifact = Self::from_bytes(&bytes)?;
        tracing::info!(blob = %name, trained_at = %artifact.trained_at, "Model artifact loaded");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::linear::LinearEstimator;
    use crate::storage::MemoryBlobStore;
    use ndarray::Array2;

    fn artifact() -> ModelArtifact {
        let names: Vec<String> = vec!["a".into(), "b".into()];
        let values = Array2::from_shape_fn((20, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = values.column(0).mapv(|v| v * 2.0) + &values.column(1);
        let x = FeatureMatrix::new(names, values).unwrap();

        let scaler = FittedScaler::fit(&x).unwrap();
        let scaled = scaler.apply(&x).unwrap();
        let trained = LinearEstimator::default().train(&scaled, &y).unwrap();
        ModelArtifact::new(scaler, trained).unwrap()
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let good = artifact();
        let other = FeatureMatrix::new(vec!["z".into(), "b".into()], Array2::eye(2)).unwrap();
        let scaler = FittedScaler::fit(&other).unwrap();
        let trained = TrainedModel {
            model: good.model().clone(),
            metrics: *good.metrics(),
        };
        assert!(matches!(
            ModelArtifact::new(scaler, trained),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn persisted_artifact_loads_back() {
        let store = MemoryBlobStore::new();
        let stored = artifact();
        stored.save(&store, "model.json").unwrap();

        let loaded = ModelArtifact::load(&store, "model.json").unwrap();
        assert_eq!(loaded, stored);
    }

    #[test]
    fn missing_blob_is_storage_error() {
        let store = MemoryBlobStore::new();
        match ModelArtifact::load(&store, "absent.json") {
            Err(PipelineError::Storage(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_or_inconsistent_bytes_are_rejected() {
        assert!(matches!(
            ModelArtifact::from_bytes(b"not json"),
            Err(PipelineError::Artifact(_))
        ));

        let mut value = serde_json::to_value(artifact()).unwrap();
        value["model"]["coefficients"] = serde_json::json!([1.0]);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            ModelArtifact::from_bytes(&bytes),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn describe_reports_parameters() {
        let a = artifact();
        let info = a.describe();
        assert_eq!(info.model_type, "Linear Regression");
        assert_eq!(info.features, ["a", "b"]);
        assert_eq!(info.model_parameters.coefficients.len(), 2);
        assert_eq!(info.model_parameters.intercept, a.model().intercept());
    }
}
