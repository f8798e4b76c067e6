//! Стандартизация признаков

#![allow(non_snake_case)]

use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{ensure_same_features, FeatureMatrix};

/// Порог, ниже которого признак считается константным
const MIN_STD: f64 = 1e-10;

/// Параметры (mean, std) по каждому признаку, обученные один раз.
/// После `fit` не изменяются.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    features: Vec<String>,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl FittedScaler {
    pub fn fit(X: &FeatureMatrix) -> Result<Self> {
        if X.nrows() == 0 {
            return Err(PipelineError::insufficient("Empty dataset"));
        }
        if X.names().is_empty() {
            return Err(PipelineError::insufficient("No feature columns"));
        }

        let mean = X
            .values()
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::insufficient("Failed to compute mean"))?;
        let mut std = X.values().std_axis(Axis(0), 0.0);

        // Константный признак только центрируется
        for val in std.iter_mut() {
            if *val < MIN_STD {
                *val = 1.0;
            }
        }

        Ok(Self {
            features: X.names().to_vec(),
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// (x - mean) / std с сохраненными параметрами, без пересчета
    pub fn apply(&self, X: &FeatureMatrix) -> Result<FeatureMatrix> {
        ensure_same_features(&self.features, X.names())?;

        let mean = Array1::from(self.mean.clone());
        let std = Array1::from(self.std.clone());
        let scaled = (X.values() - &mean) / &std;

        FeatureMatrix::new(self.features.clone(), scaled)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    /// Проверка согласованности после десериализации
    pub(crate) fn validate(&self) -> Result<()> {
        let n = self.features.len();
        if self.mean.len() != n || self.std.len() != n {
            return Err(PipelineError::schema(format!(
                "scaler has {} features but {} means and {} stds",
                n,
                self.mean.len(),
                self.std.len()
            )));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(PipelineError::schema("scaler contains a non-positive std"));
        }
        Ok(())
    }
}
