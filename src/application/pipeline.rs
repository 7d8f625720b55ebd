//! End-to-end forecasting run.
//!
//! Stages run strictly in order, each fully materialized before the next:
//! features, holdout split, regression CV + holdout, classifier CV + holdout,
//! threshold tuning, strategy comparison.

use crate::application::evaluation::harness::{
    ClassificationEvaluation, ClassifierHoldout, DEFAULT_THRESHOLD, EvaluationHarness,
    RegressionEvaluation, RegressionHoldout, evaluate_classifier_holdout,
    evaluate_regression_holdout,
};
use crate::application::evaluation::strategy_simulator::{
    BUY_AND_HOLD, StrategyComparison, StrategySimulator,
};
use crate::application::evaluation::threshold_optimizer::{ThresholdOptimizer, ThresholdSelection};
use crate::application::market_data::feature_builder::FeatureLabelBuilder;
use crate::application::ml::PredictorRegistry;
use crate::config::{MIN_HOLDOUT_DAYS, RunConfig};
use crate::domain::errors::PipelineError;
use crate::domain::market::PriceSeries;
use crate::domain::ml::SampleMatrix;
use crate::domain::ml::feature_registry::LONGEST_LOOKBACK;
use crate::domain::performance::equity_curve::EquityCurve;
use crate::domain::performance::metrics::apply_threshold;
use crate::domain::validation::WalkForwardSplit;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

/// Holdout rows scale with the data: one twentieth, floored at 60.
const HOLDOUT_FRACTION: usize = 20;

pub const REGRESSION_SIGN: &str = "RegressionSign";

#[derive(Debug, Clone, Serialize)]
pub struct RegressionStage {
    pub evaluation: RegressionEvaluation,
    pub holdout: RegressionHoldout,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationStage {
    pub evaluation: ClassificationEvaluation,
    pub holdout: ClassifierHoldout,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonStage {
    pub rows: Vec<StrategyComparison>,
    pub curves: Vec<EquityCurve>,
}

/// Everything a run produced. `None` means the stage was not computed.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub symbol: String,
    pub price_days: usize,
    pub feature_rows: usize,
    pub train_rows: usize,
    pub requested_holdout: usize,
    pub holdout_rows: usize,
    pub cv_folds: usize,
    pub regression: RegressionStage,
    pub classification: Option<ClassificationStage>,
    pub threshold: Option<ThresholdSelection>,
    pub comparison: ComparisonStage,
}

impl RunResult {
    pub fn holdout_degraded(&self) -> bool {
        self.holdout_rows < self.requested_holdout
    }
}

/// Effective holdout: `min(requested, max(60, rows / 20))`, capped at half the rows, at least 1.
pub fn resolve_holdout(requested: usize, rows: usize) -> usize {
    requested
        .min(MIN_HOLDOUT_DAYS.max(rows / HOLDOUT_FRACTION))
        .min(rows / 2)
        .max(1)
}

pub struct PredictionPipeline {
    config: RunConfig,
    regressors: PredictorRegistry,
    classifiers: PredictorRegistry,
}

impl PredictionPipeline {
    /// Pipeline over the built-in predictors selected in `config`.
    pub fn new(config: RunConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let params = &config.model_params;
        let regressors =
            PredictorRegistry::from_kinds(&config.regression_models, params, config.random_seed);
        let classifiers =
            PredictorRegistry::from_kinds(&config.classifier_models, params, config.random_seed);
        Ok(Self {
            config,
            regressors,
            classifiers,
        })
    }

    /// Pipeline over caller-supplied registries. The predictor lists in `config` are ignored.
    pub fn with_registries(
        config: RunConfig,
        regressors: PredictorRegistry,
        classifiers: PredictorRegistry,
    ) -> Result<Self, PipelineError> {
        config.validate_run_options()?;
        if regressors.is_empty() {
            return Err(PipelineError::configuration(
                "no regression predictors selected",
            ));
        }
        if config.use_classifier && classifiers.is_empty() {
            return Err(PipelineError::configuration(
                "classifier track enabled but no classifiers selected",
            ));
        }
        Ok(Self {
            config,
            regressors,
            classifiers,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run(&self, series: &PriceSeries) -> Result<RunResult, PipelineError> {
        info!(
            "Run started: {} ({} business days)",
            series.symbol(),
            series.len()
        );

        let matrix = FeatureLabelBuilder::build(series)?;
        if matrix.is_empty() {
            return Err(PipelineError::DataInsufficiency {
                available: series.len(),
                required: LONGEST_LOOKBACK + 1,
                reason: "series shorter than the longest feature lookback".to_string(),
            });
        }

        let requested = self.config.holdout_days;
        let holdout_rows = resolve_holdout(requested, matrix.len());
        if holdout_rows < requested {
            warn!(
                "Holdout reduced from {} to {} business days ({} feature rows)",
                requested,
                holdout_rows,
                matrix.len()
            );
        }
        let (train, holdout) = matrix.split_holdout(holdout_rows);
        if train.len() < 2 {
            return Err(PipelineError::DataInsufficiency {
                available: train.len(),
                required: 2,
                reason: "training partition too small after holdout".to_string(),
            });
        }
        info!(
            "Features: {} rows ({} train / {} holdout)",
            matrix.len(),
            train.len(),
            holdout.len()
        );

        let split = WalkForwardSplit::new(train.len(), self.config.cv_splits)?;
        if split.is_degraded() {
            warn!(
                "Only {} training rows for {} folds; using a single 80/20 fold",
                train.len(),
                self.config.cv_splits
            );
        }

        // Regression track
        let evaluation = EvaluationHarness::new(&self.regressors).cross_validate_regression(
            &train,
            &split,
            self.config.objective,
        )?;
        let winner = self.regressors.get(&evaluation.winner).ok_or_else(|| {
            PipelineError::configuration(format!("unknown predictor {}", evaluation.winner))
        })?;
        let regression_holdout =
            evaluate_regression_holdout(&evaluation.winner, winner, &train, &holdout)?;
        let regression = RegressionStage {
            evaluation,
            holdout: regression_holdout,
        };

        // Classifier track
        let mut classification = None;
        let mut threshold = None;
        if self.config.use_classifier {
            let evaluation = EvaluationHarness::new(&self.classifiers)
                .cross_validate_classification(&train, &split)?;
            let winner = self.classifiers.get(&evaluation.winner).ok_or_else(|| {
                PipelineError::configuration(format!("unknown predictor {}", evaluation.winner))
            })?;
            let classifier_holdout =
                evaluate_classifier_holdout(&evaluation.winner, winner, &train, &holdout)?;

            if self.config.tune_threshold {
                threshold = Some(ThresholdOptimizer::optimize(
                    &evaluation.winner,
                    winner,
                    &train,
                    &split,
                )?);
            }
            classification = Some(ClassificationStage {
                evaluation,
                holdout: classifier_holdout,
            });
        }

        let comparison = compare_strategies(
            &holdout_inputs(&holdout),
            &regression.holdout,
            classification.as_ref().map(|c| &c.holdout),
            threshold.as_ref(),
        )?;
        for row in &comparison.rows {
            info!(
                "Strategy {}: x{:.4} ({:+.2}%), max DD {:.2}%, exposure {:.1}%",
                row.strategy,
                row.final_multiplier,
                row.total_return_pct,
                row.max_drawdown_pct,
                row.exposure_pct
            );
        }

        Ok(RunResult {
            symbol: series.symbol().to_string(),
            price_days: series.len(),
            feature_rows: matrix.len(),
            train_rows: train.len(),
            requested_holdout: requested,
            holdout_rows: holdout.len(),
            cv_folds: split.len(),
            regression,
            classification,
            threshold,
            comparison,
        })
    }
}

struct HoldoutInputs {
    dates: Vec<NaiveDate>,
    log_returns: Vec<f64>,
    directions: Vec<u8>,
}

fn holdout_inputs(holdout: &SampleMatrix) -> HoldoutInputs {
    HoldoutInputs {
        dates: holdout.dates(),
        log_returns: holdout.next_log_returns(0..holdout.len()),
        directions: holdout.next_directions(0..holdout.len()),
    }
}

fn compare_strategies(
    inputs: &HoldoutInputs,
    regression: &RegressionHoldout,
    classifier: Option<&ClassifierHoldout>,
    threshold: Option<&ThresholdSelection>,
) -> Result<ComparisonStage, PipelineError> {
    let mut strategies: Vec<(String, Vec<u8>)> = vec![
        (BUY_AND_HOLD.to_string(), vec![1; inputs.log_returns.len()]),
        (
            REGRESSION_SIGN.to_string(),
            regression
                .predicted
                .iter()
                .map(|&p| u8::from(p > 0.0))
                .collect(),
        ),
    ];
    if let Some(classifier) = classifier {
        strategies.push((
            format!("Classifier@{:.1}", DEFAULT_THRESHOLD),
            apply_threshold(&classifier.scores, DEFAULT_THRESHOLD),
        ));
        if let Some(selection) = threshold {
            strategies.push((
                format!("Classifier@{:.3}", selection.threshold()),
                apply_threshold(&classifier.scores, selection.threshold()),
            ));
        }
    }

    let mut rows = Vec::with_capacity(strategies.len());
    let mut curves = Vec::with_capacity(strategies.len());
    for (name, signals) in strategies {
        let (row, curve) = StrategySimulator::compare(
            &name,
            &inputs.dates,
            &inputs.log_returns,
            &inputs.directions,
            &signals,
        )?;
        rows.push(row);
        curves.push(curve);
    }
    Ok(ComparisonStage { rows, curves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::PredictorKind;

    #[test]
    fn test_resolve_holdout() {
        // max(60, rows/20) dominates below 5040 rows
        assert_eq!(resolve_holdout(252, 1000), 60);
        assert_eq!(resolve_holdout(252, 6000), 252);
        assert_eq!(resolve_holdout(100, 6000), 100);
        // capped at half the rows
        assert_eq!(resolve_holdout(504, 100), 50);
        assert_eq!(resolve_holdout(60, 3), 1);
        assert_eq!(resolve_holdout(60, 1), 1);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = RunConfig {
            regression_models: vec![],
            ..RunConfig::default()
        };
        assert!(matches!(
            PredictionPipeline::new(config),
            Err(PipelineError::Configuration { .. })
        ));
    }

    #[test]
    fn test_with_registries_checks_run_options() {
        let config = RunConfig {
            holdout_days: 1000,
            cv_splits: 1,
            regression_models: vec![],
            ..RunConfig::default()
        };
        let regressors = PredictorRegistry::from_kinds(
            &[PredictorKind::Ridge],
            &config.model_params,
            config.random_seed,
        );
        let classifiers = PredictorRegistry::from_kinds(
            &[PredictorKind::Logistic],
            &config.model_params,
            config.random_seed,
        );
        let Err(PipelineError::Configuration { reason }) =
            PredictionPipeline::with_registries(config, regressors, classifiers)
        else {
            panic!("expected a configuration error");
        };
        assert!(reason.contains("holdout_days"));
        assert!(reason.contains("cv_splits"));
        // predictor lists in the config are not consulted
        assert!(!reason.contains("regression predictors"));
    }

    #[test]
    fn test_with_registries_accepts_valid_options() {
        let config = RunConfig {
            use_classifier: false,
            regression_models: vec![],
            ..RunConfig::default()
        };
        let regressors = PredictorRegistry::from_kinds(
            &[PredictorKind::Ridge],
            &config.model_params,
            config.random_seed,
        );
        assert!(
            PredictionPipeline::with_registries(config, regressors, PredictorRegistry::new())
                .is_ok()
        );
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let series = PriceSeries::from_closes(
            "AAA",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &vec![100.0; 150],
        )
        .unwrap();
        let pipeline = PredictionPipeline::new(RunConfig::default()).unwrap();
        assert!(matches!(
            pipeline.run(&series),
            Err(PipelineError::DataInsufficiency { available: 150, .. })
        ));
    }
}
