//! Writes run artifacts to disk: metric tables and series as CSV, plus a JSON summary.

use crate::application::evaluation::PredictorFailure;
use crate::application::evaluation::strategy_simulator::StrategyComparison;
use crate::application::pipeline::RunResult;
use crate::config::RunConfig;
use crate::domain::performance::metrics::{
    ClassificationMetrics, ConfusionMatrix, RegressionMetrics,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CV_REGRESSION: &str = "cv_regression.csv";
pub const CV_CLASSIFICATION: &str = "cv_classification.csv";
pub const HOLDOUT_PREDICTIONS: &str = "holdout_predictions.csv";
pub const CLASSIFIER_HOLDOUT_PROBS: &str = "classifier_holdout_probs.csv";
pub const THRESHOLD_SWEEP: &str = "threshold_sweep.csv";
pub const DIRECTION_COMPARISON: &str = "holdout_direction_comparison.csv";
pub const EQUITY_CURVES: &str = "equity_curves.csv";
pub const RUN_SUMMARY: &str = "run_summary.json";

#[derive(Serialize)]
struct RegressionRow<'a> {
    model: &'a str,
    fold: String,
    train_size: Option<usize>,
    validation_size: Option<usize>,
    mae: f64,
    mse: f64,
    rmse: f64,
    mape: f64,
    r2: Option<f64>,
}

impl<'a> RegressionRow<'a> {
    fn new(
        model: &'a str,
        fold: String,
        sizes: Option<(usize, usize)>,
        m: &RegressionMetrics,
    ) -> Self {
        Self {
            model,
            fold,
            train_size: sizes.map(|s| s.0),
            validation_size: sizes.map(|s| s.1),
            mae: m.mae,
            mse: m.mse,
            rmse: m.rmse,
            mape: m.mape,
            r2: m.r2,
        }
    }
}

#[derive(Serialize)]
struct ClassificationRow<'a> {
    model: &'a str,
    fold: String,
    tn: usize,
    fp: usize,
    #[serde(rename = "fn")]
    fn_: usize,
    tp: usize,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
}

impl<'a> ClassificationRow<'a> {
    fn new(
        model: &'a str,
        fold: String,
        cm: Option<&ConfusionMatrix>,
        m: &ClassificationMetrics,
    ) -> Self {
        let cm = cm.copied().unwrap_or_default();
        Self {
            model,
            fold,
            tn: cm.true_negatives(),
            fp: cm.false_positives(),
            fn_: cm.false_negatives(),
            tp: cm.true_positives(),
            accuracy: m.accuracy,
            precision: m.precision,
            recall: m.recall,
            f1: m.f1,
        }
    }
}

#[derive(Serialize)]
struct PredictionRow {
    date: NaiveDate,
    y_true: f64,
    y_pred: f64,
}

#[derive(Serialize)]
struct ProbabilityRow {
    date: NaiveDate,
    y_up_true: u8,
    p_up: f64,
}

#[derive(Serialize)]
struct SweepRow {
    threshold: f64,
    tn: usize,
    fp: usize,
    #[serde(rename = "fn")]
    fn_: usize,
    tp: usize,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
}

#[derive(Serialize)]
struct ComparisonRow<'a> {
    strategy: &'a str,
    tn: usize,
    fp: usize,
    #[serde(rename = "fn")]
    fn_: usize,
    tp: usize,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    final_multiplier: f64,
    total_return_pct: f64,
    max_drawdown_pct: f64,
    exposure_pct: f64,
}

impl<'a> From<&'a StrategyComparison> for ComparisonRow<'a> {
    fn from(row: &'a StrategyComparison) -> Self {
        Self {
            strategy: &row.strategy,
            tn: row.confusion.true_negatives(),
            fp: row.confusion.false_positives(),
            fn_: row.confusion.false_negatives(),
            tp: row.confusion.true_positives(),
            accuracy: row.metrics.accuracy,
            precision: row.metrics.precision,
            recall: row.metrics.recall,
            f1: row.metrics.f1,
            final_multiplier: row.final_multiplier,
            total_return_pct: row.total_return_pct,
            max_drawdown_pct: row.max_drawdown_pct,
            exposure_pct: row.exposure_pct,
        }
    }
}

/// Headline numbers of a run, written as JSON.
#[derive(Serialize)]
pub struct RunSummary<'a> {
    pub symbol: &'a str,
    pub config: &'a RunConfig,
    pub price_days: usize,
    pub feature_rows: usize,
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub holdout_degraded: bool,
    pub cv_folds: usize,
    pub regression_winner: &'a str,
    pub regression_holdout: &'a RegressionMetrics,
    pub classifier_winner: Option<&'a str>,
    pub classifier_holdout: Option<&'a ClassificationMetrics>,
    pub tuned_threshold: Option<f64>,
    pub failures: Vec<&'a PredictorFailure>,
    pub comparison: &'a [StrategyComparison],
}

impl<'a> RunSummary<'a> {
    pub fn new(result: &'a RunResult, config: &'a RunConfig) -> Self {
        let mut failures: Vec<&PredictorFailure> =
            result.regression.evaluation.failures.iter().collect();
        if let Some(stage) = &result.classification {
            failures.extend(stage.evaluation.failures.iter());
        }
        Self {
            symbol: &result.symbol,
            config,
            price_days: result.price_days,
            feature_rows: result.feature_rows,
            train_rows: result.train_rows,
            holdout_rows: result.holdout_rows,
            holdout_degraded: result.holdout_degraded(),
            cv_folds: result.cv_folds,
            regression_winner: &result.regression.evaluation.winner,
            regression_holdout: &result.regression.holdout.metrics,
            classifier_winner: result
                .classification
                .as_ref()
                .map(|c| c.evaluation.winner.as_str()),
            classifier_holdout: result.classification.as_ref().map(|c| &c.holdout.metrics),
            tuned_threshold: result.threshold.as_ref().map(|t| t.threshold()),
            failures,
            comparison: &result.comparison.rows,
        }
    }
}

/// Writes every artifact a run produced into one directory.
pub struct ArtifactExporter {
    output_dir: PathBuf,
}

impl ArtifactExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Returns the paths written. Artifacts for stages that did not run are skipped.
    pub fn export(&self, result: &RunResult, config: &RunConfig) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create directory: {:?}", self.output_dir))?;
        let mut written = Vec::new();

        // Regression CV: per-fold rows then one mean row per model
        let eval = &result.regression.evaluation;
        let mut rows: Vec<RegressionRow> = eval
            .folds
            .iter()
            .map(|r| {
                RegressionRow::new(
                    &r.predictor,
                    r.fold.to_string(),
                    Some((r.train_size, r.validation_size)),
                    &r.metrics,
                )
            })
            .collect();
        rows.extend(
            eval.summaries
                .iter()
                .map(|s| RegressionRow::new(&s.predictor, "mean".to_string(), None, &s.metrics)),
        );
        written.push(self.write_csv(CV_REGRESSION, &rows)?);

        let holdout = &result.regression.holdout;
        let predictions: Vec<PredictionRow> = holdout
            .dates
            .iter()
            .zip(holdout.actual.iter().zip(&holdout.predicted))
            .map(|(&date, (&y_true, &y_pred))| PredictionRow {
                date,
                y_true,
                y_pred,
            })
            .collect();
        written.push(self.write_csv(HOLDOUT_PREDICTIONS, &predictions)?);

        if let Some(stage) = &result.classification {
            let mut rows: Vec<ClassificationRow> = stage
                .evaluation
                .folds
                .iter()
                .map(|r| {
                    ClassificationRow::new(
                        &r.predictor,
                        r.fold.to_string(),
                        Some(&r.confusion),
                        &r.metrics,
                    )
                })
                .collect();
            rows.extend(stage.evaluation.summaries.iter().map(|s| {
                ClassificationRow::new(&s.predictor, "mean".to_string(), None, &s.metrics)
            }));
            written.push(self.write_csv(CV_CLASSIFICATION, &rows)?);

            let probs: Vec<ProbabilityRow> = stage
                .holdout
                .dates
                .iter()
                .zip(stage.holdout.actual.iter().zip(&stage.holdout.scores))
                .map(|(&date, (&y_up_true, &p_up))| ProbabilityRow {
                    date,
                    y_up_true,
                    p_up,
                })
                .collect();
            written.push(self.write_csv(CLASSIFIER_HOLDOUT_PROBS, &probs)?);
        }

        if let Some(selection) = &result.threshold {
            let sweep: Vec<SweepRow> = selection
                .sweep
                .iter()
                .map(|p| SweepRow {
                    threshold: p.threshold,
                    tn: p.confusion.true_negatives(),
                    fp: p.confusion.false_positives(),
                    fn_: p.confusion.false_negatives(),
                    tp: p.confusion.true_positives(),
                    accuracy: p.metrics.accuracy,
                    precision: p.metrics.precision,
                    recall: p.metrics.recall,
                    f1: p.metrics.f1,
                })
                .collect();
            written.push(self.write_csv(THRESHOLD_SWEEP, &sweep)?);
        }

        let comparison: Vec<ComparisonRow> =
            result.comparison.rows.iter().map(ComparisonRow::from).collect();
        written.push(self.write_csv(DIRECTION_COMPARISON, &comparison)?);
        written.push(self.write_equity_curves(result)?);

        let summary_path = self.output_dir.join(RUN_SUMMARY);
        let json = serde_json::to_string_pretty(&RunSummary::new(result, config))
            .context("Failed to serialize run summary to JSON")?;
        fs::write(&summary_path, json)
            .with_context(|| format!("Failed to write {:?}", summary_path))?;
        written.push(summary_path);

        info!(
            "Exported {} artifacts to {:?}",
            written.len(),
            self.output_dir
        );
        Ok(written)
    }

    fn write_csv<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut wtr = csv::Writer::from_writer(file);
        for row in rows {
            wtr.serialize(row)
                .with_context(|| format!("Failed to serialize row for {}", name))?;
        }
        wtr.flush()
            .with_context(|| format!("Failed to flush {:?}", path))?;
        Ok(path)
    }

    /// Wide format: one date column, one column per strategy.
    fn write_equity_curves(&self, result: &RunResult) -> Result<PathBuf> {
        let path = self.output_dir.join(EQUITY_CURVES);
        let curves = &result.comparison.curves;
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut wtr = csv::Writer::from_writer(file);

        let mut header = vec!["date".to_string()];
        header.extend(curves.iter().map(|c| c.name().to_string()));
        wtr.write_record(&header)?;

        let dates = curves.first().map(|c| c.dates()).unwrap_or_default();
        for (i, date) in dates.iter().enumerate() {
            let mut record = vec![date.to_string()];
            record.extend(curves.iter().map(|c| {
                c.multipliers()
                    .get(i)
                    .map(|m| m.to_string())
                    .unwrap_or_default()
            }));
            wtr.write_record(&record)?;
        }
        wtr.flush()
            .with_context(|| format!("Failed to flush {:?}", path))?;
        Ok(path)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
