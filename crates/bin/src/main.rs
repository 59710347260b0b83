//! Storecast CLI binary.
//!
//! Trains, evaluates and serves store sales forecasting pipelines.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::process;
use storecast::data::schema::{DATE, STORE};
use storecast::data::{LoaderConfig, load_and_merge, load_reference, load_transactions};
use storecast::features::{FeatureFrame, available_features};
use storecast::model::{RegressionMetrics, train_test_split};
use storecast::output::{ExportFormat, Exporter, PredictionExport, TrainingReport};
use storecast::{
    ErrorResponse, FitDiagnostics, FittedPipeline, Pipeline, PipelineConfig, PredictionRequest,
    feature_table, predict_one,
};
use tracing::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "storecast")]
#[command(about = "Storecast: store sales forecasting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a pipeline, score it on a held-out split and save the artifact
    Train {
        /// Transaction CSV (one row per store and day)
        #[arg(long)]
        transactions: PathBuf,

        /// Store reference CSV
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Pipeline configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Search the configured parameter grid before the final fit
        #[arg(long)]
        grid: bool,

        /// Where to write the model artifact
        #[arg(long)]
        output: PathBuf,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },

    /// Answer one prediction request
    Predict {
        /// Model artifact
        #[arg(long)]
        model: PathBuf,

        /// Request JSON file (stdin when absent)
        #[arg(long)]
        request: Option<PathBuf>,

        /// Store reference CSV
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// Score a saved model against a labelled file
    Evaluate {
        /// Model artifact
        #[arg(long)]
        model: PathBuf,

        /// Labelled transaction CSV
        #[arg(long)]
        transactions: PathBuf,

        /// Store reference CSV
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Write per-row predictions (.csv or .json)
        #[arg(long)]
        predictions: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },

    /// Write the feature-engineered table
    Features {
        /// Transaction CSV
        #[arg(long, required_unless_present = "list")]
        transactions: Option<PathBuf>,

        /// Store reference CSV
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Pipeline configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output CSV
        #[arg(long, required_unless_present = "list")]
        output: Option<PathBuf>,

        /// List the derived features and exit
        #[arg(long)]
        list: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Markdown,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storecast=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            transactions,
            reference,
            config,
            grid,
            output,
            format,
        } => {
            train(&transactions, reference.as_deref(), config.as_deref(), grid, &output, format)?;
        }
        Commands::Predict {
            model,
            request,
            reference,
        } => match predict(&model, request.as_deref(), reference.as_deref()) {
            Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
            Err(e) => {
                println!("{}", serde_json::to_string_pretty(&ErrorResponse::new(&e))?);
                process::exit(1);
            }
        },
        Commands::Evaluate {
            model,
            transactions,
            reference,
            predictions,
            format,
        } => {
            evaluate(&model, &transactions, reference.as_deref(), predictions.as_deref(), format)?;
        }
        Commands::Features {
            transactions,
            reference,
            config,
            output,
            list,
        } => {
            if list {
                list_features();
            } else if let (Some(transactions), Some(output)) = (transactions, output) {
                write_features(&transactions, reference.as_deref(), config.as_deref(), &output)?;
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    })
}

fn load_frame(transactions: &Path, reference: Option<&Path>, loader: &LoaderConfig) -> CliResult<DataFrame> {
    Ok(match reference {
        Some(reference) => load_and_merge(reference, transactions, loader)?,
        None => load_transactions(transactions, loader)?,
    })
}

fn train(
    transactions: &Path,
    reference: Option<&Path>,
    config_path: Option<&Path>,
    grid: bool,
    output: &Path,
    format: ReportFormat,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let frame = load_frame(transactions, reference, &config.loader)?;
    let (train, test) = train_test_split(&frame, config.test_fraction, config.split_seed)?;
    info!(train = train.height(), test = test.height(), "Split rows");

    let target = config.target.clone();
    let pipeline = Pipeline::new(config);

    let (fitted, search) = if grid {
        let total = pipeline.config().search.grid.len() as u64;
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("█▓░"),
        );
        pb.set_message("grid search");

        let (fitted, result) = pipeline.fit_with_search(&train, &target, |done, _, score| {
            pb.set_position(done as u64);
            pb.set_message(format!("last mean MSE {:.1}", score.mean_mse));
        })?;
        pb.finish_and_clear();
        (fitted, Some(result))
    } else {
        (pipeline.fit(&train, &target)?, None)
    };

    let metrics = fitted.evaluate(&test)?;

    let mut builder = TrainingReport::builder(&target, metrics, *fitted.forest().params())
        .train_rows(fitted.diagnostics().rows)
        .importances(fitted.feature_importances());
    if let Some(result) = &search {
        builder = builder.search(result);
    }
    for (name, count) in diagnostic_counts(fitted.diagnostics()) {
        builder = builder.diagnostic(name, count);
    }
    print_report(&builder.build(), format)?;

    fitted.save(output)?;
    println!("\nModel saved to {}", output.display());
    Ok(())
}

fn diagnostic_counts(diagnostics: &FitDiagnostics) -> Vec<(&'static str, usize)> {
    vec![
        ("rows without target", diagnostics.dropped_missing_target),
        (
            "imputed competition distance",
            diagnostics.prepare.imputed_competition_distance,
        ),
        ("null categorical values", diagnostics.encode.nulls),
        ("unparseable dates", diagnostics.extraction.unparseable_dates),
        ("invalid day of week", diagnostics.extraction.invalid_day_of_week),
        ("rows without next holiday", diagnostics.extraction.without_next_holiday),
        (
            "rows without previous holiday",
            diagnostics.extraction.without_previous_holiday,
        ),
        ("imputed feature values", diagnostics.scale.imputed),
    ]
}

fn print_report(report: &TrainingReport, format: ReportFormat) -> CliResult<()> {
    match format {
        ReportFormat::Text => println!("{}", report.to_ascii_table()),
        ReportFormat::Markdown => println!("{}", report.to_markdown()),
        ReportFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn predict(
    model: &Path,
    request: Option<&Path>,
    reference: Option<&Path>,
) -> CliResult<storecast::PredictionResponse> {
    let fitted = FittedPipeline::load(model)?;

    let json = match request {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let request: PredictionRequest = serde_json::from_str(&json)?;

    let reference = match reference {
        Some(path) => Some(load_reference(path, &fitted.config().loader)?),
        None => None,
    };

    Ok(predict_one(&fitted, &request, reference.as_ref())?)
}

fn evaluate(
    model: &Path,
    transactions: &Path,
    reference: Option<&Path>,
    predictions: Option<&Path>,
    format: ReportFormat,
) -> CliResult<()> {
    let fitted = FittedPipeline::load(model)?;
    let frame = load_frame(transactions, reference, &fitted.config().loader)?;

    let mask = frame.column(fitted.target())?.is_not_null();
    let labelled = frame.filter(&mask)?;
    let metrics = fitted.evaluate(&labelled)?;
    print_metrics(&metrics, fitted.target(), format)?;

    if let Some(path) = predictions {
        let export = prediction_export(&fitted, &labelled)?;
        export.export_to_file(path, ExportFormat::from_path(path)?)?;
        info!(rows = export.len(), path = %path.display(), "Wrote predictions");
    }
    Ok(())
}

fn print_metrics(metrics: &RegressionMetrics, target: &str, format: ReportFormat) -> CliResult<()> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(metrics)?),
        ReportFormat::Markdown => {
            println!("# Evaluation: {}\n", target);
            println!("| Rows | MSE | RMSE | MAE | R² |");
            println!("|------|-----|------|-----|----|");
            println!(
                "| {} | {:.4} | {:.4} | {:.4} | {:.4} |",
                metrics.n,
                metrics.mse,
                metrics.rmse(),
                metrics.mae,
                metrics.r2
            );
        }
        ReportFormat::Text => {
            println!("\nEvaluation: {}", target);
            println!("{}", "=".repeat(40));
            println!("  Rows:  {}", metrics.n);
            println!("  MSE:   {:.4}", metrics.mse);
            println!("  RMSE:  {:.4}", metrics.rmse());
            println!("  MAE:   {:.4}", metrics.mae);
            println!("  R²:    {:.4}", metrics.r2);
        }
    }
    Ok(())
}

fn prediction_export(fitted: &FittedPipeline, labelled: &DataFrame) -> CliResult<PredictionExport> {
    let predicted = fitted.predict(labelled)?;

    let stores = labelled.column(STORE)?.cast(&DataType::Int64)?;
    let stores: Vec<i64> = stores.i64()?.into_iter().map(Option::unwrap_or_default).collect();

    let dates = labelled.column(DATE)?.cast(&DataType::String)?;
    let dates: Vec<String> = dates
        .str()?
        .into_iter()
        .map(|d| d.unwrap_or_default().to_string())
        .collect();

    let actual = labelled.column(fitted.target())?.cast(&DataType::Float64)?;
    let actual: Vec<f64> = actual.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();

    Ok(PredictionExport::from_columns(&stores, &dates, &predicted, Some(&actual))?)
}

fn list_features() {
    println!("\n{:<24} {:<10} {:<8} Description", "Feature", "Category", "Model");
    println!("{}", "-".repeat(96));
    for info in available_features() {
        println!(
            "{:<24} {:<10} {:<8} {}",
            info.name,
            format!("{:?}", info.category),
            if info.model_input { "yes" } else { "no" },
            info.description
        );
    }
}

fn write_features(
    transactions: &Path,
    reference: Option<&Path>,
    config_path: Option<&Path>,
    output: &Path,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let frame = load_frame(transactions, reference, &config.loader)?;
    let FeatureFrame {
        frame: mut featured,
        report,
    } = feature_table(&frame, &config)?;

    let mut file = std::fs::File::create(output)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut featured)?;

    info!(
        rows = featured.height(),
        columns = featured.width(),
        unparseable_dates = report.unparseable_dates,
        path = %output.display(),
        "Wrote feature table"
    );
    Ok(())
}
