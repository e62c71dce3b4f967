//! CSV Data Loader Module
//! Reads a cached source CSV into a DataFrame using Polars.

use polars::prelude::*;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: PolarsError,
    },
    #[error("Cache file not found: {0}")]
    Missing(String),
}

/// Load a CSV file using Polars.
///
/// Schema inference runs over the first 10 000 rows and malformed cells
/// become nulls instead of failing the read; the merge step sweeps those
/// nulls into zeros later.
pub fn load_csv(path: &Path) -> Result<DataFrame, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::Missing(path.display().to_string()));
    }

    LazyCsvReader::new(path)
        .with_infer_schema_length(Some(10000))
        .with_ignore_errors(true)
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|source| LoaderError::Csv {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_small_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("small.csv");
        let mut file = std::fs::File::create(&path).expect("create csv");
        writeln!(file, "location,value").expect("write header");
        writeln!(file, "Andorra,1").expect("write row");
        writeln!(file, "Belgium,2").expect("write row");

        let df = load_csv(&path).expect("load should succeed");
        assert_eq!(df.height(), 2);
        assert!(df.column("location").is_ok());
    }

    #[test]
    fn malformed_numeric_cells_become_nulls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dirty.csv");
        let mut file = std::fs::File::create(&path).expect("create csv");
        writeln!(file, "location,value").expect("write header");
        for i in 0..50 {
            writeln!(file, "Andorra,{i}").expect("write row");
        }
        writeln!(file, "Belgium,not-a-number").expect("write row");

        let df = load_csv(&path).expect("load should tolerate bad cells");
        assert_eq!(df.height(), 51);
        let value = df.column("value").expect("value column");
        assert_eq!(value.null_count(), 1, "The bad cell should surface as a null");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_csv(Path::new("/nonexistent/never.csv"));
        assert!(matches!(err, Err(LoaderError::Missing(_))));
    }
}
