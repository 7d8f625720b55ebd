//! nextday - next-day stock movement forecaster
//!
//! Loads a price history CSV, cross-validates regression and direction
//! classifiers with expanding walk-forward folds, tunes a decision threshold,
//! and compares long-or-flat strategies on a final holdout.
//!
//! # Usage
//! ```sh
//! cargo run -- --input prices.csv --output-dir out/
//! ```
//!
//! # Environment Variables
//! - `HOLDOUT_DAYS`, `CV_SPLITS`, `RANDOM_SEED`
//! - `REGRESSION_MODELS`, `CLASSIFIER_MODELS` (comma separated)
//! - `OPTIMIZE_METRIC` (RMSE, MAE, MAPE, R2)
//! - `USE_CLASSIFIER`, `TUNE_THRESHOLD` (true/false)

use anyhow::{Context, Result};
use clap::Parser;
use nextday::application::ml::PredictorKind;
use nextday::application::pipeline::PredictionPipeline;
use nextday::application::reporting::RunReporter;
use nextday::config::RunConfig;
use nextday::domain::performance::metrics::RegressionObjective;
use nextday::infrastructure::{ArtifactExporter, SeriesCache};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Next-day stock movement forecaster", long_about = None)]
struct Cli {
    /// Price history CSV (Date plus Adj Close or Close; optional Ticker/Index)
    #[arg(short, long)]
    input: PathBuf,

    /// TOML file with run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Holdout size in business days (60-504)
    #[arg(long)]
    holdout_days: Option<usize>,

    /// Number of walk-forward folds (2-8)
    #[arg(long)]
    cv_splits: Option<usize>,

    /// Random seed for stochastic predictors
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated regression predictors (Ridge, RandomForest, GradientBoosting)
    #[arg(long, value_delimiter = ',')]
    models: Option<Vec<PredictorKind>>,

    /// Regression selection metric (RMSE, MAE, MAPE, R2)
    #[arg(long)]
    objective: Option<RegressionObjective>,

    /// Skip the direction classifier track
    #[arg(long)]
    no_classifier: bool,

    /// Skip decision threshold tuning
    #[arg(long)]
    no_threshold_tuning: bool,

    /// Directory for CSV/JSON artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn resolve_config(&self) -> Result<RunConfig> {
        let base = match &self.config {
            Some(path) => {
                info!("Loading run configuration from: {}", path.display());
                RunConfig::from_toml_file(path)?
            }
            None => RunConfig::default(),
        };
        let mut config = base.with_env().context("Failed to apply environment overrides")?;

        if let Some(holdout) = self.holdout_days {
            config.holdout_days = holdout;
        }
        if let Some(splits) = self.cv_splits {
            config.cv_splits = splits;
        }
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(models) = &self.models {
            config.regression_models = models.clone();
        }
        if let Some(objective) = self.objective {
            config.objective = objective;
        }
        if self.no_classifier {
            config.use_classifier = false;
        }
        if self.no_threshold_tuning {
            config.tune_threshold = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let reporter = RunReporter::new();
    reporter.print_header(&cli.input.display().to_string(), &config);

    let mut cache = SeriesCache::new();
    let loaded = cache
        .get_or_load_path(&cli.input)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    if loaded.tickers_seen > 1 {
        info!(
            "{} tickers in input; using {} (most observations)",
            loaded.tickers_seen, loaded.ticker
        );
    }

    let pipeline = PredictionPipeline::new(config.clone())?;
    let result = pipeline.run(&loaded.series)?;
    reporter.print_run(&result);

    if let Some(dir) = &cli.output_dir {
        let written = ArtifactExporter::new(dir).export(&result, &config)?;
        for path in written {
            println!("💾 Saved: {}", path.display());
        }
    }

    Ok(())
}
