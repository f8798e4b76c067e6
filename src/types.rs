/// Типы данных конвейера

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// Значение ячейки до санитизации
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::String(s) => Cell::Text(s.clone()),
            // bool, массивы и объекты не являются числами
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Cell::Missing
        } else {
            Cell::Number(value)
        }
    }
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

/// Сырые табличные данные: упорядоченные колонки и строки ячеек
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Строки должны иметь ровно столько ячеек, сколько колонок
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some(pos) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(PipelineError::schema(format!(
                "row {} has {} values, expected {}",
                pos,
                rows[pos].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Построение из JSON-записей. Порядок колонок - порядок первого появления ключа,
    /// отсутствующий в строке ключ считается пропуском.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).map(Cell::from).unwrap_or(Cell::Missing))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Один запрос на предсказание как набор из одной строки
    pub fn from_feature_map(features: &Map<String, Value>) -> Self {
        Self::from_records(std::slice::from_ref(features))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let records: Vec<Map<String, Value>> = serde_json::from_slice(bytes)
            .map_err(|e| PipelineError::validation(format!("expected an array of records: {e}")))?;
        Ok(Self::from_records(&records))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Результат санитизации: только числа, без пропусков и дубликатов
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFrame {
    pub(crate) columns: Vec<String>,
    pub(crate) values: Array2<f64>,
}

impl NumericFrame {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Отделение целевой колонки от признаков (обучающие данные)
    pub fn split_target(&self, target: &str) -> Result<(FeatureMatrix, Array1<f64>)> {
        let target_idx = self
            .columns
            .iter()
            .position(|c| c == target)
            .ok_or_else(|| PipelineError::schema(format!("target column '{target}' not found")))?;

        let keep: Vec<usize> = (0..self.columns.len()).filter(|&i| i != target_idx).collect();
        let names = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let values = self.values.select(Axis(1), &keep);
        let targets = self.values.column(target_idx).to_owned();

        Ok((FeatureMatrix { names, values }, targets))
    }

    /// Все колонки как признаки (данные для инференса)
    pub fn into_features(self) -> FeatureMatrix {
        FeatureMatrix {
            names: self.columns,
            values: self.values,
        }
    }
}

impl From<NumericFrame> for Dataset {
    fn from(frame: NumericFrame) -> Self {
        let rows = frame
            .values
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|&v| Cell::Number(v)).collect())
            .collect();
        Self {
            columns: frame.columns,
            rows,
        }
    }
}

/// Матрица признаков с именованными колонками
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub(crate) names: Vec<String>,
    pub(crate) values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(PipelineError::schema(format!(
                "{} feature names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }
}

/// Проверка совпадения признаков по именам и порядку
pub(crate) fn ensure_same_features(expected: &[String], actual: &[String]) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(PipelineError::schema(format!(
        "feature names {:?} do not match trained features {:?}",
        actual, expected
    )))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainRequest {
    pub rows: Vec<Map<String, Value>>,
}

/// Диагностика на отложенной выборке
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mse: f64,
    pub r2: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub features: Vec<String>,
    pub model_parameters: ModelParameters,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub metrics: Metrics,
    pub trained_at: chrono::DateTime<chrono::Utc>,
}
