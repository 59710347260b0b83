//! Training run reports.
//!
//! A [`TrainingReport`] collects what a training run produced: held-out
//! metrics, the forest parameters that were fitted, the cross-validation
//! table when a grid search ran, the row-level recoveries and the feature
//! importances. It renders as an ASCII table for terminals, Markdown for
//! documents and JSON for machines.

use crate::error::{OutputError, Result};
use crate::export::{ExportFormat, Exporter, csv_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use storecast_model::{ForestParams, RegressionMetrics, SearchResult};

/// One grid search combination and its cross-validated error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CvRow {
    /// Number of trees
    pub n_estimators: usize,
    /// Depth limit, `None` for unlimited
    pub max_depth: Option<usize>,
    /// Minimum rows to split a node
    pub min_samples_split: usize,
    /// Mean MSE over folds
    pub mean_mse: f64,
    /// Standard deviation of the fold MSEs
    pub std_mse: f64,
    /// Whether this combination was selected
    pub best: bool,
}

/// A named count of rows or values recovered during a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEntry {
    /// What was counted
    pub name: String,
    /// How many
    pub count: usize,
}

/// Importance of one model input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureImportance {
    /// Feature column
    pub feature: String,
    /// Share of the total impurity decrease
    pub importance: f64,
}

/// Summary of a training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
    /// Target column
    pub target: String,
    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,
    /// Rows used for fitting
    pub train_rows: usize,
    /// Held-out metrics
    pub metrics: RegressionMetrics,
    /// Parameters of the fitted forest
    pub params: ForestParams,
    /// Cross-validation table, empty without a grid search
    pub cv: Vec<CvRow>,
    /// Row-level recoveries
    pub diagnostics: Vec<DiagnosticEntry>,
    /// Feature importances, most important first
    pub importances: Vec<FeatureImportance>,
}

impl TrainingReport {
    /// Start a report for `target`.
    pub fn builder(target: impl Into<String>, metrics: RegressionMetrics, params: ForestParams) -> TrainingReportBuilder {
        TrainingReportBuilder::new(target, metrics, params)
    }

    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The selected grid search row, if a search ran.
    pub fn best_cv_row(&self) -> Option<&CvRow> {
        self.cv.iter().find(|row| row.best)
    }

    /// Render as a fixed-width table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nTraining Report: {}\n", self.target));
        output.push_str(&format!("Generated: {}\n", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        output.push_str(&"=".repeat(72));
        output.push('\n');

        output.push_str("\nHeld-out Metrics:\n");
        output.push_str(&"-".repeat(72));
        output.push('\n');
        output.push_str(&format!("  Training rows:   {}\n", self.train_rows));
        output.push_str(&format!("  Held-out rows:   {}\n", self.metrics.n));
        output.push_str(&format!("  MSE:             {:.4}\n", self.metrics.mse));
        output.push_str(&format!("  RMSE:            {:.4}\n", self.metrics.rmse()));
        output.push_str(&format!("  MAE:             {:.4}\n", self.metrics.mae));
        output.push_str(&format!("  R²:              {:.4}\n", self.metrics.r2));

        output.push_str("\nForest Parameters:\n");
        output.push_str(&"-".repeat(72));
        output.push('\n');
        output.push_str(&format!("  Trees:           {}\n", self.params.n_estimators));
        output.push_str(&format!("  Max depth:       {}\n", depth_label(self.params.max_depth)));
        output.push_str(&format!("  Min split:       {}\n", self.params.min_samples_split));
        output.push_str(&format!("  Min leaf:        {}\n", self.params.min_samples_leaf));
        output.push_str(&format!("  Bootstrap:       {}\n", self.params.bootstrap));
        output.push_str(&format!("  Seed:            {}\n", self.params.seed));

        if !self.cv.is_empty() {
            output.push_str("\nCross-validation:\n");
            output.push_str(&"-".repeat(72));
            output.push('\n');
            output.push_str(&format!(
                "  {:>6} {:>10} {:>10} {:>18} {:>18}\n",
                "Trees", "Depth", "Min split", "Mean MSE", "Std MSE"
            ));
            for row in &self.cv {
                output.push_str(&format!(
                    "{} {:>6} {:>10} {:>10} {:>18.4} {:>18.4}\n",
                    if row.best { "*" } else { " " },
                    row.n_estimators,
                    depth_label(row.max_depth),
                    row.min_samples_split,
                    row.mean_mse,
                    row.std_mse
                ));
            }
        }

        if !self.diagnostics.is_empty() {
            output.push_str("\nDiagnostics:\n");
            output.push_str(&"-".repeat(72));
            output.push('\n');
            for entry in &self.diagnostics {
                output.push_str(&format!("  {:<40} {:>10}\n", entry.name, entry.count));
            }
        }

        if !self.importances.is_empty() {
            output.push_str("\nFeature Importances:\n");
            output.push_str(&"-".repeat(72));
            output.push('\n');
            for item in &self.importances {
                output.push_str(&format!("  {:<30} {:>9.2}%\n", item.feature, item.importance * 100.0));
            }
        }

        output
    }

    /// Render as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Training Report: {}\n\n", self.target));
        output.push_str(&format!(
            "**Generated:** {}\n\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        output.push_str("## Held-out Metrics\n\n");
        output.push_str(&format!("- **Training rows:** {}\n", self.train_rows));
        output.push_str(&format!("- **Held-out rows:** {}\n", self.metrics.n));
        output.push_str(&format!("- **MSE:** {:.4}\n", self.metrics.mse));
        output.push_str(&format!("- **RMSE:** {:.4}\n", self.metrics.rmse()));
        output.push_str(&format!("- **MAE:** {:.4}\n", self.metrics.mae));
        output.push_str(&format!("- **R²:** {:.4}\n\n", self.metrics.r2));

        output.push_str("## Forest Parameters\n\n");
        output.push_str("| Trees | Max depth | Min split | Min leaf | Bootstrap | Seed |\n");
        output.push_str("|-------|-----------|-----------|----------|-----------|------|\n");
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n\n",
            self.params.n_estimators,
            depth_label(self.params.max_depth),
            self.params.min_samples_split,
            self.params.min_samples_leaf,
            self.params.bootstrap,
            self.params.seed
        ));

        if !self.cv.is_empty() {
            output.push_str("## Cross-validation\n\n");
            output.push_str("| Trees | Max depth | Min split | Mean MSE | Std MSE | Selected |\n");
            output.push_str("|-------|-----------|-----------|----------|---------|----------|\n");
            for row in &self.cv {
                output.push_str(&format!(
                    "| {} | {} | {} | {:.4} | {:.4} | {} |\n",
                    row.n_estimators,
                    depth_label(row.max_depth),
                    row.min_samples_split,
                    row.mean_mse,
                    row.std_mse,
                    if row.best { "yes" } else { "" }
                ));
            }
            output.push('\n');
        }

        if !self.diagnostics.is_empty() {
            output.push_str("## Diagnostics\n\n");
            for entry in &self.diagnostics {
                output.push_str(&format!("- **{}:** {}\n", entry.name, entry.count));
            }
            output.push('\n');
        }

        if !self.importances.is_empty() {
            output.push_str("## Feature Importances\n\n");
            output.push_str("| Feature | Importance |\n");
            output.push_str("|---------|------------|\n");
            for item in &self.importances {
                output.push_str(&format!("| {} | {:.2}% |\n", item.feature, item.importance * 100.0));
            }
        }

        output
    }
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii_table())
    }
}

/// CSV exports the cross-validation table; JSON exports the whole report.
impl Exporter for TrainingReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv if self.cv.is_empty() => Err(OutputError::InvalidFormat(
                "report has no cross-validation table to write as CSV".to_string(),
            )),
            ExportFormat::Csv => csv_string(&self.cv),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => self.to_json(),
        }
    }
}

fn depth_label(depth: Option<usize>) -> String {
    depth.map_or_else(|| "none".to_string(), |d| d.to_string())
}

/// Builder for [`TrainingReport`].
#[derive(Debug)]
pub struct TrainingReportBuilder {
    target: String,
    train_rows: usize,
    metrics: RegressionMetrics,
    params: ForestParams,
    cv: Vec<CvRow>,
    diagnostics: Vec<DiagnosticEntry>,
    importances: Vec<FeatureImportance>,
}

impl TrainingReportBuilder {
    /// Create a builder with the required fields.
    pub fn new(target: impl Into<String>, metrics: RegressionMetrics, params: ForestParams) -> Self {
        Self {
            target: target.into(),
            train_rows: 0,
            metrics,
            params,
            cv: Vec::new(),
            diagnostics: Vec::new(),
            importances: Vec::new(),
        }
    }

    /// Set the number of training rows.
    pub const fn train_rows(mut self, rows: usize) -> Self {
        self.train_rows = rows;
        self
    }

    /// Fill the cross-validation table from a grid search.
    pub fn search(mut self, result: &SearchResult) -> Self {
        self.cv = result
            .scores
            .iter()
            .enumerate()
            .map(|(i, score)| CvRow {
                n_estimators: score.params.n_estimators,
                max_depth: score.params.max_depth,
                min_samples_split: score.params.min_samples_split,
                mean_mse: score.mean_mse,
                std_mse: score.std_mse,
                best: i == result.best_index,
            })
            .collect();
        self
    }

    /// Add one diagnostic count.
    pub fn diagnostic(mut self, name: impl Into<String>, count: usize) -> Self {
        self.diagnostics.push(DiagnosticEntry {
            name: name.into(),
            count,
        });
        self
    }

    /// Set feature importances; they are sorted most important first.
    pub fn importances<I, S>(mut self, importances: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.importances = importances
            .into_iter()
            .map(|(feature, importance)| FeatureImportance {
                feature: feature.into(),
                importance,
            })
            .collect();
        self.importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        self
    }

    /// Build the report.
    pub fn build(self) -> TrainingReport {
        TrainingReport {
            target: self.target,
            timestamp: Utc::now(),
            train_rows: self.train_rows,
            metrics: self.metrics,
            params: self.params,
            cv: self.cv,
            diagnostics: self.diagnostics,
            importances: self.importances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> RegressionMetrics {
        RegressionMetrics {
            mse: 250_000.0,
            mae: 400.0,
            r2: 0.87,
            n: 200,
        }
    }

    #[test]
    fn test_builder_sorts_importances() {
        let report = TrainingReport::builder("Sales", metrics(), ForestParams::default())
            .train_rows(800)
            .importances([("Promo", 0.2), ("Store", 0.5), ("DayOfWeek", 0.3)])
            .build();

        assert_eq!(report.train_rows, 800);
        let order: Vec<&str> = report.importances.iter().map(|i| i.feature.as_str()).collect();
        assert_eq!(order, vec!["Store", "DayOfWeek", "Promo"]);
        assert!(report.best_cv_row().is_none());
    }

    #[test]
    fn test_ascii_skips_empty_sections() {
        let report = TrainingReport::builder("Sales", metrics(), ForestParams::default()).build();
        let ascii = report.to_ascii_table();

        assert!(ascii.contains("Training Report: Sales"));
        assert!(ascii.contains("RMSE:            500.0000"));
        assert!(ascii.contains("Max depth:       none"));
        assert!(!ascii.contains("Cross-validation"));
        assert!(!ascii.contains("Diagnostics"));
        assert_eq!(report.to_string(), ascii);
    }

    #[test]
    fn test_markdown_lists_diagnostics() {
        let report = TrainingReport::builder("Sales", metrics(), ForestParams::default())
            .diagnostic("rows without target", 3)
            .build();
        let markdown = report.to_markdown();

        assert!(markdown.starts_with("# Training Report: Sales"));
        assert!(markdown.contains("- **rows without target:** 3"));
        assert!(markdown.contains("| 100 | none | 2 | 1 | true | 42 |"));
    }

    #[test]
    fn test_csv_needs_a_search() {
        let report = TrainingReport::builder("Sales", metrics(), ForestParams::default()).build();
        assert!(matches!(
            report.export_to_string(ExportFormat::Csv),
            Err(OutputError::InvalidFormat(_))
        ));
    }
}
