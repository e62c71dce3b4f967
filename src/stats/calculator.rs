//! Statistics Calculator Module
//! Pearson correlation across the derived health and policy columns,
//! feeding the correlation heatmap.

use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Column '{0}' missing from merged table")]
    MissingColumn(String),
}

/// Handles the correlation computations behind the heatmap.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Pairwise Pearson correlation matrix over `columns`.
    ///
    /// Any row with a null in one of the listed columns is dropped before
    /// the computation, mirroring a pandas `dropna().corr()`.
    pub fn correlation_matrix(
        df: &DataFrame,
        columns: &[&str],
    ) -> Result<Vec<Vec<f64>>, StatsError> {
        let mut casted: Vec<Column> = Vec::with_capacity(columns.len());
        for name in columns {
            let column = df
                .column(name)
                .map_err(|_| StatsError::MissingColumn((*name).to_string()))?;
            casted.push(column.cast(&DataType::Float64)?);
        }
        let mut chunked: Vec<&Float64Chunked> = Vec::with_capacity(columns.len());
        for column in &casted {
            chunked.push(column.f64()?);
        }

        // Keep only rows where every listed column has a value.
        let mut complete: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
        for i in 0..df.height() {
            let row: Option<Vec<f64>> = chunked.iter().map(|ca| ca.get(i)).collect();
            if let Some(row) = row {
                for (series, value) in complete.iter_mut().zip(row) {
                    series.push(value);
                }
            }
        }

        let n = columns.len();
        let mut matrix = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                let corr = Self::pearson(&complete[i], &complete[j]);
                matrix[i][j] = corr;
                matrix[j][i] = corr;
            }
        }

        Ok(matrix)
    }

    /// Sample Pearson correlation of two equally long slices.
    pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
        let n = x.len().min(y.len());
        if n < 2 {
            return f64::NAN;
        }

        let mean_x = x[..n].iter().sum::<f64>() / n as f64;
        let mean_y = y[..n].iter().sum::<f64>() / n as f64;

        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for i in 0..n {
            let dx = x[i] - mean_x;
            let dy = y[i] - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }

        let denom = (var_x * var_y).sqrt();
        if denom == 0.0 {
            return f64::NAN;
        }
        cov / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn pearson_detects_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];

        assert!((StatsCalculator::pearson(&x, &up) - 1.0).abs() < 1e-12);
        assert!((StatsCalculator::pearson(&x, &down) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_is_nan_for_constant_series() {
        let x = [1.0, 2.0, 3.0];
        let flat = [5.0, 5.0, 5.0];
        assert!(StatsCalculator::pearson(&x, &flat).is_nan());
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let df = df!(
            "a" => [1.0, 2.0, 3.0, 4.0],
            "b" => [2.0, 4.0, 5.9, 8.1],
            "c" => [4.0, 3.0, 2.0, 1.0],
        )
        .expect("frame");

        let matrix = StatsCalculator::correlation_matrix(&df, &["a", "b", "c"]).expect("matrix");
        for i in 0..3 {
            assert!((matrix[i][i] - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((matrix[i][j] - matrix[j][i]).abs() < 1e-12);
            }
        }
        assert!(matrix[0][2] < 0.0, "a and c move in opposite directions");
    }

    #[test]
    fn rows_with_nulls_are_dropped() {
        let df = df!(
            "a" => [Some(1.0), Some(2.0), None, Some(4.0)],
            "b" => [Some(2.0), Some(4.0), Some(6.0), Some(8.0)],
        )
        .expect("frame");

        let matrix = StatsCalculator::correlation_matrix(&df, &["a", "b"]).expect("matrix");
        assert!(
            (matrix[0][1] - 1.0).abs() < 1e-12,
            "The null row should not disturb the remaining perfect correlation"
        );
    }

    #[test]
    fn missing_column_is_reported() {
        let df = df!("a" => [1.0, 2.0]).expect("frame");
        let err = StatsCalculator::correlation_matrix(&df, &["a", "nope"]);
        assert!(matches!(err, Err(StatsError::MissingColumn(name)) if name == "nope"));
    }
}
