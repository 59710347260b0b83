//! Fit/predict composition of the pipeline stages.
//!
//! Fitting runs, in order:
//!
//! 1. drop rows without a target, then impute and drop columns per [`LoaderConfig`]
//! 2. collect the holiday calendar from the raw holiday indicator
//! 3. fit one encoding table per categorical column and encode
//! 4. derive calendar features with the fixed calendar
//! 5. fit the scaler on the feature matrix, then the forest on the scaled matrix
//!
//! Prediction replays steps 1 and 3 to 5 with the fitted encoders, calendar
//! and scaler; nothing is refitted.
//!
//! [`LoaderConfig`]: storecast_data::LoaderConfig

use crate::config::PipelineConfig;
use crate::error::Result;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use storecast_data::schema::{DATE, missing_columns, require_columns};
use storecast_data::{PrepareReport, prepare};
use storecast_features::{
    ColumnEncoders, EncodeReport, ExtractionReport, FeatureConfig, FeatureError, FeatureExtractor,
    FeatureFrame, HolidayCalendar,
};
use storecast_model::{
    CandidateScore, ForestParams, ModelError, RandomForestRegressor, RegressionMetrics, Regressor,
    ScaleReport, SearchResult, StandardScaler, evaluate, to_matrix, to_vector,
};
use tracing::{info, warn};

/// Row-level recoveries made while fitting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Rows used for fitting
    pub rows: usize,
    /// Rows dropped because the target was missing
    pub dropped_missing_target: usize,
    /// Imputation and column drops
    pub prepare: PrepareReport,
    /// Null categorical values
    pub encode: EncodeReport,
    /// Unparseable dates and missing holiday neighbours
    pub extraction: ExtractionReport,
    /// Missing numeric values replaced by the column mean
    pub scale: ScaleReport,
}

/// Row-level recoveries made while predicting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictDiagnostics {
    /// Rows scored
    pub rows: usize,
    /// Imputation and column drops
    pub prepare: PrepareReport,
    /// Null and fallback categorical values
    pub encode: EncodeReport,
    /// Unparseable dates and missing holiday neighbours
    pub extraction: ExtractionReport,
    /// Missing numeric values replaced by the column mean
    pub scale: ScaleReport,
}

/// Predictions with the recoveries made to produce them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// One value per input row, in input order
    pub values: Vec<f64>,
    /// Recoveries
    pub diagnostics: PredictDiagnostics,
}

/// Unfitted pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

/// Target vector and prepared feature frame
struct TrainingFrame {
    frame: DataFrame,
    target: Array1<f64>,
    dropped_missing_target: usize,
    prepare: PrepareReport,
}

/// Fitted preprocessing, before the scaler
struct Preprocessed {
    encoders: ColumnEncoders,
    calendar: HolidayCalendar,
    feature_columns: Vec<String>,
    matrix: Array2<f64>,
    encode: EncodeReport,
    extraction: ExtractionReport,
}

impl Pipeline {
    /// Create a pipeline.
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fit every stage on `df` with the configured forest parameters.
    pub fn fit(&self, df: &DataFrame, target: &str) -> Result<FittedPipeline> {
        self.config.validate()?;
        let training = self.training_frame(df, target)?;
        let pre = self.preprocess(&training.frame)?;
        self.finish(target, training, pre, self.config.forest)
    }

    /// Search the configured grid, then fit every stage with the best
    /// combination.
    ///
    /// Encoders and calendar are fitted once on `df`; the scaler is refitted
    /// inside every fold. `on_scored(done, total, score)` runs after each
    /// combination.
    pub fn fit_with_search<F>(&self, df: &DataFrame, target: &str, on_scored: F) -> Result<(FittedPipeline, SearchResult)>
    where
        F: FnMut(usize, usize, &CandidateScore),
    {
        self.config.validate()?;
        let training = self.training_frame(df, target)?;
        let pre = self.preprocess(&training.frame)?;

        let result = self
            .config
            .search
            .run_with(&pre.matrix, &training.target, &self.config.forest, on_scored)?;
        let best = result.best_params();

        let fitted = self.finish(target, training, pre, best)?;
        Ok((fitted, result))
    }

    fn training_frame(&self, df: &DataFrame, target: &str) -> Result<TrainingFrame> {
        require_columns(df, "training", &[target])?;

        let mask = df.column(target)?.is_not_null();
        let labelled = df.filter(&mask)?;
        let dropped_missing_target = df.height() - labelled.height();
        if dropped_missing_target > 0 {
            warn!(rows = dropped_missing_target, target, "Dropped rows without a target value");
        }
        if labelled.height() == 0 {
            return Err(ModelError::EmptyInput(format!("no rows with a '{target}' value")).into());
        }

        let target_values = to_vector(&labelled, target)?;
        let (frame, prepare) = prepare(&labelled.drop(target)?, &self.config.loader)?;

        Ok(TrainingFrame {
            frame,
            target: target_values,
            dropped_missing_target,
            prepare,
        })
    }

    fn preprocess(&self, frame: &DataFrame) -> Result<Preprocessed> {
        if self.config.features.sales_growth {
            warn!("SalesGrowthRate is derived from the target and is not used as a model feature");
        }
        let features = model_features(&self.config.features);

        let calendar = HolidayCalendar::from_frame(frame, &features.date_formats)?;
        info!(holidays = calendar.len(), "Collected holiday calendar");

        let encoders = ColumnEncoders::fit(frame, self.config.unknown_category)?;
        let (encoded, encode) = encoders.transform(frame)?;
        info!(columns = encoders.columns().count(), "Encoded categorical columns");

        let extractor = FeatureExtractor::new(features).with_calendar(calendar.clone());
        let FeatureFrame { frame: featured, report: extraction } = extractor.transform(&encoded)?;

        let feature_columns: Vec<String> = featured
            .get_column_names()
            .into_iter()
            .filter(|c| c.as_str() != DATE)
            .map(|c| c.to_string())
            .collect();
        let matrix = to_matrix(&featured, &feature_columns)?;

        Ok(Preprocessed {
            encoders,
            calendar,
            feature_columns,
            matrix,
            encode,
            extraction,
        })
    }

    fn finish(
        &self,
        target: &str,
        training: TrainingFrame,
        pre: Preprocessed,
        params: ForestParams,
    ) -> Result<FittedPipeline> {
        let mut scaler = StandardScaler::new();
        let (scaled, scale) = scaler.fit_transform(&pre.matrix)?;

        let mut forest = RandomForestRegressor::new(params)?;
        forest.fit(&scaled, &training.target)?;

        let diagnostics = FitDiagnostics {
            rows: training.target.len(),
            dropped_missing_target: training.dropped_missing_target,
            prepare: training.prepare,
            encode: pre.encode,
            extraction: pre.extraction,
            scale,
        };
        info!(
            rows = diagnostics.rows,
            features = pre.feature_columns.len(),
            trees = params.n_estimators,
            "Fitted pipeline"
        );

        Ok(FittedPipeline {
            config: self.config.clone(),
            target: target.to_string(),
            encoders: pre.encoders,
            calendar: pre.calendar,
            feature_columns: pre.feature_columns,
            scaler,
            forest,
            diagnostics,
        })
    }
}

/// Feature settings used for model inputs: the sales growth rate reads the
/// target and is never one of them.
fn model_features(config: &FeatureConfig) -> FeatureConfig {
    FeatureConfig {
        sales_growth: false,
        ..config.clone()
    }
}

/// Encoded, feature-engineered copy of `df` for inspection.
///
/// Unlike the model inputs this keeps `Date` and adds `SalesGrowthRate`.
/// The holiday calendar is collected from the raw indicator before encoding
/// replaces it with codes.
pub fn feature_table(df: &DataFrame, config: &PipelineConfig) -> Result<FeatureFrame> {
    let (frame, _) = prepare(df, &config.loader)?;
    let calendar = HolidayCalendar::from_frame(&frame, &config.features.date_formats)?;

    let encoders = ColumnEncoders::fit(&frame, config.unknown_category)?;
    let (encoded, _) = encoders.transform(&frame)?;

    let extractor = FeatureExtractor::new(FeatureConfig {
        sales_growth: true,
        drop_date: false,
        ..config.features.clone()
    })
    .with_calendar(calendar);
    Ok(extractor.transform(&encoded)?)
}

/// Pipeline with every stage fitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    config: PipelineConfig,
    target: String,
    encoders: ColumnEncoders,
    calendar: HolidayCalendar,
    feature_columns: Vec<String>,
    scaler: StandardScaler,
    forest: RandomForestRegressor,
    diagnostics: FitDiagnostics,
}

impl FittedPipeline {
    /// Configuration the pipeline was fitted with.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Target column.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Fitted encoding tables.
    pub const fn encoders(&self) -> &ColumnEncoders {
        &self.encoders
    }

    /// Holiday calendar collected at fit time.
    pub const fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    /// Model input columns, in matrix order.
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Fitted scaler.
    pub const fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Fitted forest.
    pub const fn forest(&self) -> &RandomForestRegressor {
        &self.forest
    }

    /// Recoveries made while fitting.
    pub const fn diagnostics(&self) -> &FitDiagnostics {
        &self.diagnostics
    }

    /// Feature importances, most important first.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.forest.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .feature_columns
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Predict one value per row of `df`.
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<f64>> {
        Ok(self.predict_with_diagnostics(df)?.values)
    }

    /// Predict and report the recoveries made.
    pub fn predict_with_diagnostics(&self, df: &DataFrame) -> Result<Prediction> {
        let (matrix, mut diagnostics) = self.feature_matrix(df)?;
        let values = self.forest.predict(&matrix)?.to_vec();
        diagnostics.rows = values.len();
        Ok(Prediction { values, diagnostics })
    }

    /// Score the pipeline on a labelled frame.
    ///
    /// Rows without a target value are skipped.
    pub fn evaluate(&self, df: &DataFrame) -> Result<RegressionMetrics> {
        require_columns(df, "evaluation", &[self.target.as_str()])?;
        let mask = df.column(&self.target)?.is_not_null();
        let labelled = df.filter(&mask)?;

        let actuals = to_vector(&labelled, &self.target)?.to_vec();
        let predictions = self.predict(&labelled)?;
        let metrics = evaluate(&predictions, &actuals)?;

        info!(
            rows = metrics.n,
            mse = metrics.mse,
            mae = metrics.mae,
            r2 = metrics.r2,
            "Evaluated pipeline"
        );
        Ok(metrics)
    }

    fn feature_matrix(&self, df: &DataFrame) -> Result<(Array2<f64>, PredictDiagnostics)> {
        let unlabelled = if df.column(&self.target).is_ok() {
            df.drop(&self.target)?
        } else {
            df.clone()
        };
        let (frame, prepare) = prepare(&unlabelled, &self.config.loader)?;

        let (encoded, encode) = self.encoders.transform(&frame)?;
        let extractor =
            FeatureExtractor::new(model_features(&self.config.features)).with_calendar(self.calendar.clone());
        let FeatureFrame { frame: featured, report: extraction } = extractor.transform(&encoded)?;

        let required: Vec<&str> = self.feature_columns.iter().map(String::as_str).collect();
        let missing = missing_columns(&featured, &required);
        if !missing.is_empty() {
            return Err(FeatureError::MissingColumns(missing).into());
        }

        let matrix = to_matrix(&featured, &self.feature_columns)?;
        let (scaled, scale) = self.scaler.transform(&matrix)?;
        if scale.imputed > 0 {
            warn!(values = scale.imputed, "Missing feature values replaced by the training mean");
        }

        Ok((
            scaled,
            PredictDiagnostics {
                rows: featured.height(),
                prepare,
                encode,
                extraction,
                scale,
            },
        ))
    }
}
