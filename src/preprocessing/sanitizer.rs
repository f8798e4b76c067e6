//! Санитизация сырых табличных данных

use std::collections::HashSet;

use ndarray::Array2;

use crate::error::{PipelineError, Result};
use crate::types::{Cell, Dataset, NumericFrame};

pub struct Sanitizer;

impl Sanitizer {
    /// Удаляет строки с пропусками, приводит колонки к f64 и удаляет дубликаты.
    /// Порядок оставшихся строк сохраняется (остается первое вхождение).
    pub fn sanitize(data: &Dataset) -> Result<NumericFrame> {
        let columns = data.columns().to_vec();
        let n_cols = columns.len();

        let complete: Vec<&Vec<Cell>> = data
            .rows()
            .iter()
            .filter(|row| !row.iter().any(Cell::is_missing))
            .collect();

        let mut seen: HashSet<Vec<u64>> = HashSet::with_capacity(complete.len());
        let mut flat: Vec<f64> = Vec::with_capacity(complete.len() * n_cols);

        for row in complete {
            let mut values = Vec::with_capacity(n_cols);
            for (col, cell) in columns.iter().zip(row) {
                values.push(Self::coerce(col, cell)?);
            }

            if seen.insert(values.iter().map(|v| row_key(*v)).collect()) {
                flat.extend(values);
            }
        }

        let n_rows = flat.len().checked_div(n_cols).unwrap_or(0);
        let values = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| PipelineError::schema(format!("inconsistent row shape: {e}")))?;

        Ok(NumericFrame { columns, values })
    }

    fn coerce(column: &str, cell: &Cell) -> Result<f64> {
        let value = match cell {
            Cell::Number(v) => *v,
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                PipelineError::schema(format!("column '{column}' contains non-numeric value '{s}'"))
            })?,
            Cell::Missing => {
                return Err(PipelineError::validation(format!(
                    "column '{column}' contains a missing value"
                )))
            }
        };

        if !value.is_finite() {
            return Err(PipelineError::validation(format!(
                "column '{column}' contains a non-finite value"
            )));
        }
        Ok(value)
    }
}

/// Ключ для поиска дубликатов: точное равенство, -0.0 == 0.0
fn row_key(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}
