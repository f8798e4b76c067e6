//! Запуск обучения: санитизация -> стандартизация -> линейная модель

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use crate::models::{LinearEstimator, ModelArtifact};
use crate::preprocessing::{FittedScaler, Sanitizer};
use crate::types::{Cell, Dataset};

pub const SAMPLE_FEATURES: [&str; 3] = ["feature1", "feature2", "feature3"];

pub struct TrainingPipeline {
    target: String,
    estimator: LinearEstimator,
}

impl TrainingPipeline {
    pub fn new(target: impl Into<String>, estimator: LinearEstimator) -> Self {
        Self {
            target: target.into(),
            estimator,
        }
    }

    pub fn from_config(cfg: &TrainingConfig) -> Self {
        Self::new(
            cfg.target_column.clone(),
            LinearEstimator::new(cfg.test_fraction, cfg.seed),
        )
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Полный запуск обучения. При любой ошибке артефакт не создается.
    pub fn run(&self, data: &Dataset) -> Result<ModelArtifact> {
        if data.is_empty() {
            return Err(PipelineError::insufficient("Empty dataset"));
        }

        let clean = Sanitizer::sanitize(data)?;
        tracing::debug!(
            raw_rows = data.len(),
            clean_rows = clean.nrows(),
            "Training data sanitized"
        );
        if clean.nrows() == 0 {
            return Err(PipelineError::insufficient("No rows left after sanitization"));
        }

        let (features, targets) = clean.split_target(&self.target)?;
        let scaler = FittedScaler::fit(&features)?;
        let scaled = scaler.apply(&features)?;
        let trained = self.estimator.train(&scaled, &targets)?;

        ModelArtifact::new(scaler, trained)
    }
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new("target", LinearEstimator::default())
    }
}

/// Синтетический набор: feature1..feature3 и target, равномерно в [0, 1)
pub fn sample_dataset(rows: usize, seed: u64) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns: Vec<String> = SAMPLE_FEATURES
        .iter()
        .map(|c| c.to_string())
        .chain(std::iter::once("target".to_string()))
        .collect();

    let data: Vec<Vec<Cell>> = (0..rows)
        .map(|_| {
            (0..columns.len())
                .map(|_| Cell::Number(rng.gen::<f64>()))
                .collect()
        })
        .collect();

    Dataset::new(columns, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trains_on_sample_data() {
        let artifact = TrainingPipeline::default()
            .run(&sample_dataset(100, 42).unwrap())
            .unwrap();

        assert_eq!(artifact.scaler().features(), SAMPLE_FEATURES);
        assert_eq!(artifact.model().coefficients().len(), 3);
        assert!(artifact.metrics().r2.is_finite());
        assert!(artifact.metrics().mse.is_finite());
        assert_eq!(artifact.metrics().test_rows, 20);
    }

    #[test]
    fn empty_dataset_fails() {
        let empty = Dataset::new(vec!["feature1".into(), "target".into()], vec![]).unwrap();
        assert!(matches!(
            TrainingPipeline::default().run(&empty),
            Err(PipelineError::InsufficientData(_))
        ));
    }

    #[test]
    fn all_rows_missing_fails() {
        let ds = Dataset::new(
            vec!["feature1".into(), "target".into()],
            vec![vec![Cell::Missing, Cell::Number(1.0)]; 5],
        )
        .unwrap();
        assert!(matches!(
            TrainingPipeline::default().run(&ds),
            Err(PipelineError::InsufficientData(_))
        ));
    }

    #[test]
    fn missing_target_is_schema_error() {
        let ds = sample_dataset(10, 1).unwrap();
        let pipeline = TrainingPipeline::new("label", LinearEstimator::default());
        assert!(matches!(pipeline.run(&ds), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn sample_dataset_is_seeded() {
        let a = sample_dataset(5, 9).unwrap();
        assert_eq!(a, sample_dataset(5, 9).unwrap());
        assert_ne!(a, sample_dataset(5, 10).unwrap());
        assert_eq!(a.columns(), ["feature1", "feature2", "feature3", "target"]);
    }
}
