//! CSV and JSON export of predictions and reports.

use crate::error::{OutputError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values
    Csv,

    /// Compact JSON
    Json,

    /// Pretty-printed JSON
    PrettyJson,
}

impl ExportFormat {
    /// File extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Pick a format from a file extension (`csv` or `json`).
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::PrettyJson),
            _ => Err(OutputError::InvalidFormat(format!(
                "cannot infer export format from '{}'",
                path.display()
            ))),
        }
    }
}

/// Serialize `records` as CSV with a header row.
pub(crate) fn csv_string<T, I>(records: I) -> Result<String>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// One scored row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRow {
    /// Store identifier
    pub store: i64,
    /// Date as it appeared in the input
    pub date: String,
    /// Predicted value
    pub predicted: f64,
    /// Actual value, when the input was labelled
    pub actual: Option<f64>,
}

/// Predictions for a batch of rows
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictionExport {
    /// Rows in input order
    pub rows: Vec<PredictionRow>,
}

impl PredictionExport {
    /// Zip parallel columns into rows.
    ///
    /// Every slice must have the same length as `predicted`.
    pub fn from_columns(
        stores: &[i64],
        dates: &[String],
        predicted: &[f64],
        actual: Option<&[f64]>,
    ) -> Result<Self> {
        let n = predicted.len();
        let lengths_match = stores.len() == n && dates.len() == n && actual.is_none_or(|a| a.len() == n);
        if !lengths_match {
            return Err(OutputError::InvalidFormat(format!(
                "column lengths differ: {} stores, {} dates, {} predictions",
                stores.len(),
                dates.len(),
                n
            )));
        }

        let rows = (0..n)
            .map(|i| PredictionRow {
                store: stores[i],
                date: dates[i].clone(),
                predicted: predicted[i],
                actual: actual.map(|a| a[i]),
            })
            .collect();
        Ok(Self { rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl Exporter for PredictionExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => csv_string(&self.rows),
            ExportFormat::Json => Ok(serde_json::to_string(&self.rows)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&self.rows)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn export() -> PredictionExport {
        PredictionExport::from_columns(
            &[1, 2],
            &["2015-07-31".to_string(), "2015-07-31".to_string()],
            &[5263.5, 6064.0],
            Some(&[5263.0, 6064.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let csv = export().export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "store,date,predicted,actual");
        assert_eq!(lines[1], "1,2015-07-31,5263.5,5263.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_unlabelled_rows_leave_actual_empty() {
        let export =
            PredictionExport::from_columns(&[7], &["2015-08-01".to_string()], &[100.0], None).unwrap();
        let csv = export.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(','));

        let json = export.export_to_string(ExportFormat::Json).unwrap();
        assert!(json.contains("\"actual\":null"));
    }

    #[test]
    fn test_length_mismatch() {
        let result = PredictionExport::from_columns(&[1, 2], &["2015-01-01".to_string()], &[1.0, 2.0], None);
        assert!(matches!(result, Err(OutputError::InvalidFormat(_))));
    }

    #[test]
    fn test_pretty_json_roundtrip() {
        let export = export();
        let json = export.export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(json.contains("\n  "));
        let rows: Vec<PredictionRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows, export.rows);
    }

    #[rstest]
    #[case("predictions.csv", Some(ExportFormat::Csv))]
    #[case("predictions.JSON", Some(ExportFormat::PrettyJson))]
    #[case("predictions.parquet", None)]
    #[case("predictions", None)]
    fn test_format_from_path(#[case] path: &str, #[case] expected: Option<ExportFormat>) {
        assert_eq!(ExportFormat::from_path(Path::new(path)).ok(), expected);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export().export_to_file(&path, ExportFormat::Csv).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("store,date,predicted,actual"));
    }
}
