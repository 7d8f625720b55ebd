//! Console output for a finished run.

use crate::application::evaluation::PredictorFailure;
use crate::application::pipeline::{ClassificationStage, RegressionStage, RunResult};
use crate::config::RunConfig;
use crate::domain::performance::metrics::ConfusionMatrix;

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

pub struct RunReporter;

impl RunReporter {
    pub fn new() -> Self {
        Self
    }

    /// Prints the header banner for the run.
    pub fn print_header(&self, input: &str, config: &RunConfig) {
        println!("{}", "=".repeat(80));
        println!("📈 NEXT-DAY MOVEMENT FORECAST");
        println!("{}", "=".repeat(80));
        println!("Input:        {}", input);
        println!("Holdout:      {} business days (requested)", config.holdout_days);
        println!("CV folds:     {}", config.cv_splits);
        println!("Seed:         {}", config.random_seed);
        println!(
            "Regressors:   {}",
            config
                .regression_models
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Objective:    {}", config.objective);
        println!(
            "Classifier:   {}",
            if config.use_classifier { "on" } else { "off" }
        );
        println!(
            "Tune tau:     {}",
            if config.use_classifier && config.tune_threshold {
                "on"
            } else {
                "off"
            }
        );
        println!("{}", "=".repeat(80));
    }

    pub fn print_run(&self, result: &RunResult) {
        println!("\n📄 Data: {}", result.symbol);
        println!("  Business days:  {}", result.price_days);
        println!("  Feature rows:   {}", result.feature_rows);
        println!("  Train rows:     {}", result.train_rows);
        println!("  Holdout rows:   {}", result.holdout_rows);
        if result.holdout_degraded() {
            println!(
                "  ⚠️  Holdout reduced from {} requested days",
                result.requested_holdout
            );
        }
        println!("  CV folds:       {}", result.cv_folds);

        self.print_regression(&result.regression);
        if let Some(stage) = &result.classification {
            self.print_classification(stage);
        }
        if let Some(selection) = &result.threshold {
            println!("\n🎯 Tuned threshold ({}):", selection.predictor);
            println!("  tau:            {:.3}", selection.threshold());
            println!("  OOF F1:         {:.4}", selection.best.metrics.f1);
            println!("  OOF Accuracy:   {:.4}", selection.best.metrics.accuracy);
            println!("  Pooled samples: {}", selection.pooled_samples);
        }
        self.print_comparison(result);
    }

    fn print_regression(&self, stage: &RegressionStage) {
        let eval = &stage.evaluation;
        println!("\n{}", "=".repeat(80));
        println!("📈 REGRESSION - walk-forward CV (sorted by {})", eval.objective);
        println!("{}", "=".repeat(80));
        println!(
            "{:<4} | {:<18} | {:>10} | {:>10} | {:>10} | {:>10} | {:>8}",
            "#", "Model", "MAE", "RMSE", "MAPE%", "R2", "Folds"
        );
        println!("{}", "-".repeat(80));
        for (i, s) in eval.summaries.iter().enumerate() {
            println!(
                "{:<4} | {:<18} | {:>10.6} | {:>10.6} | {:>10.2} | {:>10} | {:>8}",
                i + 1,
                s.predictor,
                s.metrics.mae,
                s.metrics.rmse,
                s.metrics.mape,
                fmt_opt(s.metrics.r2),
                s.folds
            );
        }
        self.print_failures(&eval.failures);

        let h = &stage.holdout;
        println!("\n🏆 Holdout ({}):", h.predictor);
        println!("  MAE:            {:.6}", h.metrics.mae);
        println!("  RMSE:           {:.6}", h.metrics.rmse);
        println!("  MAPE:           {:.2}%", h.metrics.mape);
        println!("  R2:             {}", fmt_opt(h.metrics.r2));
    }

    fn print_classification(&self, stage: &ClassificationStage) {
        let eval = &stage.evaluation;
        println!("\n{}", "=".repeat(80));
        println!("🧮 CLASSIFIER - walk-forward CV at 0.5 (sorted by F1)");
        println!("{}", "=".repeat(80));
        println!(
            "{:<4} | {:<18} | {:>9} | {:>9} | {:>9} | {:>9} | {:>6}",
            "#", "Model", "Accuracy", "Precision", "Recall", "F1", "Folds"
        );
        println!("{}", "-".repeat(80));
        for (i, s) in eval.summaries.iter().enumerate() {
            println!(
                "{:<4} | {:<18} | {:>9.4} | {:>9.4} | {:>9.4} | {:>9.4} | {:>6}",
                i + 1,
                s.predictor,
                s.metrics.accuracy,
                s.metrics.precision,
                s.metrics.recall,
                s.metrics.f1,
                s.folds
            );
        }
        self.print_failures(&eval.failures);

        let h = &stage.holdout;
        println!("\n🏆 Holdout ({}, {:?} scores) @0.5:", h.predictor, h.score_source);
        println!("  Accuracy:       {:.4}", h.metrics.accuracy);
        println!("  F1:             {:.4}", h.metrics.f1);
        print_confusion(&h.confusion);
    }

    fn print_comparison(&self, result: &RunResult) {
        println!("\n{}", "=".repeat(80));
        println!("🧪 HOLDOUT STRATEGY COMPARISON");
        println!("{}", "=".repeat(80));
        println!(
            "{:<18} | {:>8} | {:>7} | {:>9} | {:>9} | {:>8} | {:>9}",
            "Strategy", "Accuracy", "F1", "Final x", "Return%", "MaxDD%", "Exposure%"
        );
        println!("{}", "-".repeat(80));
        for row in &result.comparison.rows {
            println!(
                "{:<18} | {:>8.4} | {:>7.4} | {:>9.4} | {:>9.2} | {:>8.2} | {:>9.1}",
                row.strategy,
                row.metrics.accuracy,
                row.metrics.f1,
                row.final_multiplier,
                row.total_return_pct,
                row.max_drawdown_pct,
                row.exposure_pct
            );
        }
        println!("{}\n", "=".repeat(80));
    }

    fn print_failures(&self, failures: &[PredictorFailure]) {
        for failure in failures {
            let fold = failure
                .fold
                .map_or_else(|| "-".to_string(), |f| f.to_string());
            println!(
                "  ⚠️  {} excluded (fold {}): {}",
                failure.predictor, fold, failure.reason
            );
        }
    }
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn print_confusion(cm: &ConfusionMatrix) {
    println!("                  pred down   pred up");
    println!(
        "  true down     {:>10} {:>9}",
        cm.true_negatives(),
        cm.false_positives()
    );
    println!(
        "  true up       {:>10} {:>9}",
        cm.false_negatives(),
        cm.true_positives()
    );
}
