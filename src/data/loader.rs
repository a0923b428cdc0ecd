//! CSV loading and saving

use crate::error::{LiftError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Tokens parsed as missing values (empty fields are missing already)
pub const NULL_TOKENS: [&str; 2] = ["NA", "#DIV/0!"];

/// CSV loader for the sensor tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned for schema inference (None = whole file)
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        // Sparse summary columns start with long runs of NA, so infer over every row
        Self {
            infer_schema_length: None,
        }
    }

    /// Limit schema inference to the first `n` rows
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    fn read_options(&self) -> CsvReadOptions {
        let null_values = NullValues::AllColumns(NULL_TOKENS.iter().map(|s| (*s).into()).collect());
        let parse_opts = CsvParseOptions::default().with_null_values(Some(null_values));

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
    }

    /// Parse CSV bytes, e.g. a downloaded table
    pub fn load_csv_bytes(&self, bytes: Vec<u8>) -> Result<DataFrame> {
        self.read_options()
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| LiftError::Data(e.to_string()))
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| LiftError::Data(format!("cannot open {}: {}", path.display(), e)))?;

        self.read_options()
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| LiftError::Data(e.to_string()))
    }
}

/// Save a frame as CSV
pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .finish(df)
        .map_err(|e| LiftError::Data(e.to_string()))
}

/// Per-column summary shown by `liftsense info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub non_missing_fraction: f64,
}

/// Summarise every column of a frame
pub fn describe(df: &DataFrame) -> Vec<ColumnInfo> {
    let height = df.height();
    df.get_columns()
        .iter()
        .map(|col| {
            let null_count = col.null_count();
            ColumnInfo {
                name: col.name().to_string(),
                dtype: col.dtype().to_string(),
                null_count,
                non_missing_fraction: if height == 0 {
                    0.0
                } else {
                    (height - null_count) as f64 / height as f64
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
user,roll_belt,kurtosis_roll_belt,classe
adelmo,1.41,NA,A
carlitos,1.42,#DIV/0!,B
pedro,,0.5,A
";

    #[test]
    fn test_null_tokens() {
        let df = DataLoader::new()
            .load_csv_bytes(SAMPLE.as_bytes().to_vec())
            .unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 4);
        assert_eq!(df.column("kurtosis_roll_belt").unwrap().null_count(), 2);
        assert_eq!(df.column("roll_belt").unwrap().null_count(), 1);
    }

    #[test]
    fn test_load_and_save_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let loader = DataLoader::new();
        let mut df = loader.load_csv(file.path()).unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        save_csv(&mut df, out.path()).unwrap();
        let reloaded = loader.load_csv(out.path()).unwrap();

        assert_eq!(reloaded.height(), 3);
        assert_eq!(reloaded.width(), 4);
    }

    #[test]
    fn test_describe() {
        let df = DataLoader::new()
            .load_csv_bytes(SAMPLE.as_bytes().to_vec())
            .unwrap();
        let info = describe(&df);

        let kurtosis = info.iter().find(|c| c.name == "kurtosis_roll_belt").unwrap();
        assert_eq!(kurtosis.null_count, 2);
        assert!((kurtosis.non_missing_fraction - 1.0 / 3.0).abs() < 1e-12);
    }
}
