//! Линейная регрессия (OLS) поверх linfa-linear

#![allow(non_snake_case)]

use linfa::traits::Fit;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{ensure_same_features, FeatureMatrix, Metrics};

/// Обученная модель: коэффициенты по признакам и свободный член
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    features: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl Model {
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// intercept + Σ coef_i * x_i для каждой строки
    pub fn predict(&self, X: &FeatureMatrix) -> Result<Array1<f64>> {
        ensure_same_features(&self.features, X.names())?;
        let coef = Array1::from(self.coefficients.clone());
        Ok(X.values().dot(&coef) + self.intercept)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.coefficients.len() != self.features.len() {
            return Err(PipelineError::schema(format!(
                "model has {} features but {} coefficients",
                self.features.len(),
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::schema("model contains non-finite parameters"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: Model,
    pub metrics: Metrics,
}

/// Обучение с воспроизводимым разбиением train/test
#[derive(Debug, Clone)]
pub struct LinearEstimator {
    test_fraction: f64,
    seed: u64,
}

impl LinearEstimator {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction: test_fraction.clamp(0.0, 1.0),
            seed,
        }
    }

    pub fn train(&self, X: &FeatureMatrix, y: &Array1<f64>) -> Result<TrainedModel> {
        if X.nrows() != y.len() {
            return Err(PipelineError::schema(format!(
                "{} feature rows but {} targets",
                X.nrows(),
                y.len()
            )));
        }
        if X.nrows() == 0 {
            return Err(PipelineError::insufficient("Empty dataset"));
        }

        let (train_idx, test_idx) = self.split(X.nrows())?;

        let X_train = X.values().select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let X_test = X.values().select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);

        // Константные и линейно зависимые колонки получают коэффициент 0
        let active = independent_columns(&X_train);
        if active.len() < X.names().len() {
            let dropped: Vec<&String> = X
                .names()
                .iter()
                .enumerate()
                .filter(|(j, _)| !active.contains(j))
                .map(|(_, name)| name)
                .collect();
            tracing::warn!(?dropped, "Constant or collinear features get zero coefficients");
        }

        let mut coefficients = vec![0.0; X.names().len()];
        let intercept = if active.is_empty() {
            y_train.mean().unwrap_or(0.0)
        } else {
            let fitted = LinearRegression::new()
                .fit(&linfa::Dataset::new(X_train.select(Axis(1), &active), y_train))
                .map_err(|e| {
                    PipelineError::insufficient(format!("Least squares fit failed: {e}"))
                })?;
            for (&j, &c) in active.iter().zip(fitted.params()) {
                coefficients[j] = c;
            }
            fitted.intercept()
        };

        let model = Model {
            features: X.names().to_vec(),
            coefficients,
            intercept,
        };
        model.validate().map_err(|_| {
            PipelineError::insufficient("Least squares fit produced non-finite parameters")
        })?;

        let y_pred = predict_raw(&model, &X_test);
        let metrics = Metrics {
            mse: mean_squared_error(&y_test, &y_pred),
            r2: r2_score(&y_test, &y_pred),
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
        };

        tracing::info!(
            "Linear model trained. MSE: {:.4}, R2: {:.4} ({} train / {} test rows)",
            metrics.mse,
            metrics.r2,
            metrics.train_rows,
            metrics.test_rows
        );
        if metrics.test_rows < 2 {
            tracing::warn!(
                test_rows = metrics.test_rows,
                "Held-out partition too small, R2 is not informative"
            );
        }

        Ok(TrainedModel { model, metrics })
    }

    /// Перемешивание индексов фиксированным seed, затем 80/20 (по умолчанию)
    fn split(&self, n: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let n_test = (n as f64 * self.test_fraction).ceil() as usize;
        let n_train = n.saturating_sub(n_test);
        if n_test == 0 || n_train == 0 {
            return Err(PipelineError::insufficient(format!(
                "Need at least 2 rows to split into train/test, got {n}"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let test = indices.split_off(n_train);
        Ok((indices, test))
    }
}

impl Default for LinearEstimator {
    fn default() -> Self {
        Self::new(0.2, 42)
    }
}

/// Порог нормы центрированной колонки на строку, ниже - колонка константная
const MIN_COLUMN_NORM: f64 = 1e-10;
/// Относительная доля нормы, оставшаяся после ортогонализации
const RANK_TOL: f64 = 1e-8;

/// Индексы линейно независимых центрированных колонок (Грам-Шмидт по порядку)
fn independent_columns(X: &Array2<f64>) -> Vec<usize> {
    let scale = (X.nrows().max(1) as f64).sqrt();
    let mut basis: Vec<Array1<f64>> = Vec::new();
    let mut keep = Vec::new();

    for (j, col) in X.columns().into_iter().enumerate() {
        let mut v = &col - col.mean().unwrap_or(0.0);
        let norm0 = v.dot(&v).sqrt();
        if norm0 / scale < MIN_COLUMN_NORM {
            continue;
        }

        for b in &basis {
            let p = v.dot(b);
            v.scaled_add(-p, b);
        }
        let norm = v.dot(&v).sqrt();
        if norm > RANK_TOL * norm0 {
            basis.push(v / norm);
            keep.push(j);
        }
    }

    keep
}

fn predict_raw(model: &Model, X: &Array2<f64>) -> Array1<f64> {
    X.dot(&Array1::from(model.coefficients.clone())) + model.intercept
}

fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(|e| e * e).mean().unwrap_or(0.0)
}

/// Коэффициент детерминации; для константной выборки 1.0 при точном совпадении, иначе 0.0
fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = (y_true - y_pred).mapv(|e| e * e).sum();
    let ss_tot: f64 = y_true.mapv(|v| (v - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}
