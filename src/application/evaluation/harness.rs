//! Walk-forward cross-validation of competing predictors.
//!
//! Every (predictor, fold) pair gets a fresh instance from its factory, so no
//! fitted state leaks between folds. A predictor that fails on any fold is
//! dropped from the comparison with a failure notice; the others carry on.

use crate::application::ml::{PredictorRegistry, ScoreSource, positive_scores};
use crate::domain::errors::{PipelineError, PredictorError};
use crate::domain::ml::{Predictor, PredictorFactory, SampleMatrix};
use crate::domain::performance::metrics::{
    ClassificationMetrics, ConfusionMatrix, RegressionMetrics, RegressionObjective,
    apply_threshold,
};
use crate::domain::validation::{Fold, WalkForwardSplit};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// A predictor excluded from the comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorFailure {
    pub predictor: String,
    /// Fold where it failed, `None` for failures outside cross-validation.
    pub fold: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionFoldRecord {
    pub predictor: String,
    pub fold: usize,
    pub train_size: usize,
    pub validation_size: usize,
    pub metrics: RegressionMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionSummary {
    pub predictor: String,
    pub folds: usize,
    pub metrics: RegressionMetrics,
}

/// Cross-validation outcome for the regression track. `summaries` is ordered best first.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionEvaluation {
    pub objective: RegressionObjective,
    pub folds: Vec<RegressionFoldRecord>,
    pub summaries: Vec<RegressionSummary>,
    pub failures: Vec<PredictorFailure>,
    pub winner: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationFoldRecord {
    pub predictor: String,
    pub fold: usize,
    pub train_size: usize,
    pub validation_size: usize,
    pub score_source: ScoreSource,
    pub confusion: ConfusionMatrix,
    pub metrics: ClassificationMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationSummary {
    pub predictor: String,
    pub folds: usize,
    pub metrics: ClassificationMetrics,
}

/// Cross-validation outcome for the direction track, ranked by mean F1 at 0.5.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationEvaluation {
    pub folds: Vec<ClassificationFoldRecord>,
    pub summaries: Vec<ClassificationSummary>,
    pub failures: Vec<PredictorFailure>,
    pub winner: String,
}

/// Winning regressor refit on the full training partition, scored on the holdout.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionHoldout {
    pub predictor: String,
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub metrics: RegressionMetrics,
}

/// Winning classifier refit on the full training partition, scored on the holdout.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierHoldout {
    pub predictor: String,
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<u8>,
    pub scores: Vec<f64>,
    pub score_source: ScoreSource,
    pub confusion: ConfusionMatrix,
    pub metrics: ClassificationMetrics,
}

pub struct EvaluationHarness<'a> {
    registry: &'a PredictorRegistry,
}

impl<'a> EvaluationHarness<'a> {
    pub fn new(registry: &'a PredictorRegistry) -> Self {
        Self { registry }
    }

    pub fn cross_validate_regression(
        &self,
        train: &SampleMatrix,
        split: &WalkForwardSplit,
        objective: RegressionObjective,
    ) -> Result<RegressionEvaluation, PipelineError> {
        self.check_inputs(train, split)?;

        let mut folds = Vec::new();
        let mut summaries = Vec::new();
        let mut failures = Vec::new();

        for (name, factory) in self.registry.iter() {
            let mut records = Vec::with_capacity(split.len());
            let mut failed = false;

            for fold in split {
                match regression_fold(factory, train, &fold) {
                    Ok(metrics) => {
                        debug!(
                            "{} fold {}: train={} val={} RMSE={:.6}",
                            name,
                            fold.index,
                            fold.train_len(),
                            fold.validation_len(),
                            metrics.rmse
                        );
                        records.push(RegressionFoldRecord {
                            predictor: name.to_string(),
                            fold: fold.index,
                            train_size: fold.train_len(),
                            validation_size: fold.validation_len(),
                            metrics,
                        });
                    }
                    Err(e) => {
                        failures.push(record_failure(name, fold.index, &e));
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                continue;
            }

            let mean = RegressionMetrics::mean(
                &records.iter().map(|r| r.metrics).collect::<Vec<_>>(),
            );
            info!(
                "CV {}: mean {}={}",
                name,
                objective,
                format_metric(mean.value(objective))
            );
            summaries.push(RegressionSummary {
                predictor: name.to_string(),
                folds: records.len(),
                metrics: mean,
            });
            folds.extend(records);
        }

        summaries.sort_by(|a, b| {
            compare_objective(
                a.metrics.value(objective),
                b.metrics.value(objective),
                objective.higher_is_better(),
            )
        });

        let winner = summaries
            .first()
            .map(|s| s.predictor.clone())
            .ok_or(PipelineError::NoSurvivingPredictor {
                failed: failures.len(),
            })?;
        info!("Best regression predictor by {}: {}", objective, winner);

        Ok(RegressionEvaluation {
            objective,
            folds,
            summaries,
            failures,
            winner,
        })
    }

    pub fn cross_validate_classification(
        &self,
        train: &SampleMatrix,
        split: &WalkForwardSplit,
    ) -> Result<ClassificationEvaluation, PipelineError> {
        self.check_inputs(train, split)?;

        let mut folds = Vec::new();
        let mut summaries = Vec::new();
        let mut failures = Vec::new();

        for (name, factory) in self.registry.iter() {
            let mut records = Vec::with_capacity(split.len());
            let mut failed = false;

            for fold in split {
                match classification_fold(factory, train, &fold) {
                    Ok((score_source, confusion)) => {
                        let metrics = ClassificationMetrics::from_confusion(&confusion);
                        debug!(
                            "{} fold {}: acc={:.4} f1={:.4} ({:?})",
                            name, fold.index, metrics.accuracy, metrics.f1, score_source
                        );
                        records.push(ClassificationFoldRecord {
                            predictor: name.to_string(),
                            fold: fold.index,
                            train_size: fold.train_len(),
                            validation_size: fold.validation_len(),
                            score_source,
                            confusion,
                            metrics,
                        });
                    }
                    Err(e) => {
                        failures.push(record_failure(name, fold.index, &e));
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                continue;
            }

            let mean = ClassificationMetrics::mean(
                &records.iter().map(|r| r.metrics).collect::<Vec<_>>(),
            );
            info!(
                "CV {}: mean F1={:.4} accuracy={:.4}",
                name, mean.f1, mean.accuracy
            );
            summaries.push(ClassificationSummary {
                predictor: name.to_string(),
                folds: records.len(),
                metrics: mean,
            });
            folds.extend(records);
        }

        summaries.sort_by(|a, b| compare_objective(Some(a.metrics.f1), Some(b.metrics.f1), true));

        let winner = summaries
            .first()
            .map(|s| s.predictor.clone())
            .ok_or(PipelineError::NoSurvivingPredictor {
                failed: failures.len(),
            })?;
        info!("Best classifier by F1: {}", winner);

        Ok(ClassificationEvaluation {
            folds,
            summaries,
            failures,
            winner,
        })
    }

    fn check_inputs(
        &self,
        train: &SampleMatrix,
        split: &WalkForwardSplit,
    ) -> Result<(), PipelineError> {
        if self.registry.is_empty() {
            return Err(PipelineError::configuration("no predictors selected"));
        }
        if split.n_samples() != train.len() {
            return Err(PipelineError::configuration(format!(
                "fold generator covers {} samples but training partition has {}",
                split.n_samples(),
                train.len()
            )));
        }
        Ok(())
    }
}

/// Refit the regression winner on the whole training partition and score the holdout.
pub fn evaluate_regression_holdout(
    name: &str,
    factory: &PredictorFactory,
    train: &SampleMatrix,
    holdout: &SampleMatrix,
) -> Result<RegressionHoldout, PipelineError> {
    let mut predictor = factory();
    predictor.fit(&train.all_features(), &train.next_log_returns(0..train.len()))?;
    let predicted = checked_predict(predictor.as_ref(), &holdout.all_features())?;
    let actual = holdout.next_log_returns(0..holdout.len());
    let metrics = RegressionMetrics::calculate(&actual, &predicted);
    info!(
        "Holdout {}: RMSE={:.6} MAE={:.6} R2={}",
        name,
        metrics.rmse,
        metrics.mae,
        format_metric(metrics.r2)
    );

    Ok(RegressionHoldout {
        predictor: name.to_string(),
        dates: holdout.dates(),
        actual,
        predicted,
        metrics,
    })
}

/// Refit the winning classifier on the whole training partition and score the holdout at 0.5.
pub fn evaluate_classifier_holdout(
    name: &str,
    factory: &PredictorFactory,
    train: &SampleMatrix,
    holdout: &SampleMatrix,
) -> Result<ClassifierHoldout, PipelineError> {
    let mut predictor = factory();
    predictor.fit(&train.all_features(), &direction_targets(train, 0..train.len()))?;
    let features = holdout.all_features();
    let (scores, score_source) = checked_scores(predictor.as_ref(), &features)?;
    let actual = holdout.next_directions(0..holdout.len());
    let confusion =
        ConfusionMatrix::from_labels(&actual, &apply_threshold(&scores, DEFAULT_THRESHOLD));
    let metrics = ClassificationMetrics::from_confusion(&confusion);
    info!(
        "Holdout {}: accuracy={:.4} F1={:.4} @0.5",
        name, metrics.accuracy, metrics.f1
    );

    Ok(ClassifierHoldout {
        predictor: name.to_string(),
        dates: holdout.dates(),
        actual,
        scores,
        score_source,
        confusion,
        metrics,
    })
}

pub(crate) fn direction_targets(matrix: &SampleMatrix, range: std::ops::Range<usize>) -> Vec<f64> {
    matrix
        .next_directions(range)
        .into_iter()
        .map(f64::from)
        .collect()
}

/// Scores with the output length checked against the input rows.
pub(crate) fn checked_scores(
    predictor: &dyn Predictor,
    features: &[Vec<f64>],
) -> Result<(Vec<f64>, ScoreSource), PredictorError> {
    let (scores, source) = positive_scores(predictor, features)?;
    check_length(predictor, features.len(), scores.len())?;
    Ok((scores, source))
}

fn checked_predict(
    predictor: &dyn Predictor,
    features: &[Vec<f64>],
) -> Result<Vec<f64>, PredictorError> {
    let predictions = predictor.predict(features)?;
    check_length(predictor, features.len(), predictions.len())?;
    Ok(predictions)
}

fn check_length(
    predictor: &dyn Predictor,
    expected: usize,
    got: usize,
) -> Result<(), PredictorError> {
    if expected == got {
        Ok(())
    } else {
        Err(PredictorError::predict(
            predictor.name(),
            format!("returned {} values for {} rows", got, expected),
        ))
    }
}

fn regression_fold(
    factory: &PredictorFactory,
    train: &SampleMatrix,
    fold: &Fold,
) -> Result<RegressionMetrics, PredictorError> {
    let mut predictor = factory();
    predictor.fit(
        &train.features(fold.train.clone()),
        &train.next_log_returns(fold.train.clone()),
    )?;
    let predicted = checked_predict(predictor.as_ref(), &train.features(fold.validation.clone()))?;
    let actual = train.next_log_returns(fold.validation.clone());
    Ok(RegressionMetrics::calculate(&actual, &predicted))
}

fn classification_fold(
    factory: &PredictorFactory,
    train: &SampleMatrix,
    fold: &Fold,
) -> Result<(ScoreSource, ConfusionMatrix), PredictorError> {
    let mut predictor = factory();
    predictor.fit(
        &train.features(fold.train.clone()),
        &direction_targets(train, fold.train.clone()),
    )?;
    let (scores, source) =
        checked_scores(predictor.as_ref(), &train.features(fold.validation.clone()))?;
    let actual = train.next_directions(fold.validation.clone());
    let confusion =
        ConfusionMatrix::from_labels(&actual, &apply_threshold(&scores, DEFAULT_THRESHOLD));
    Ok((source, confusion))
}

fn record_failure(name: &str, fold: usize, error: &PredictorError) -> PredictorFailure {
    warn!(
        "Predictor {} failed on fold {}: {}. Excluding it from the comparison.",
        name, fold, error
    );
    PredictorFailure {
        predictor: name.to_string(),
        fold: Some(fold),
        reason: error.to_string(),
    }
}

/// Best first. Undefined values always sort after defined ones.
fn compare_objective(a: Option<f64>, b: Option<f64>, higher_is_better: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = if higher_is_better {
                y.partial_cmp(&x)
            } else {
                x.partial_cmp(&y)
            };
            ord.unwrap_or(Ordering::Equal)
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| format!("{:.6}", v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::{LabelPair, Sample};
    use crate::domain::ml::sample_matrix::FeatureRow;
    use chrono::Duration;
    use std::sync::Arc;

    struct ConstantModel {
        value: f64,
    }

    impl Predictor for ConstantModel {
        fn name(&self) -> &str {
            "Constant"
        }
        fn fit(&mut self, _: &[Vec<f64>], _: &[f64]) -> Result<(), PredictorError> {
            Ok(())
        }
        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
            Ok(vec![self.value; features.len()])
        }
    }

    struct FirstFeature;

    impl Predictor for FirstFeature {
        fn name(&self) -> &str {
            "FirstFeature"
        }
        fn fit(&mut self, _: &[Vec<f64>], _: &[f64]) -> Result<(), PredictorError> {
            Ok(())
        }
        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
            Ok(features.iter().map(|r| r[0]).collect())
        }
    }

    struct ShortOutput;

    impl Predictor for ShortOutput {
        fn name(&self) -> &str {
            "ShortOutput"
        }
        fn fit(&mut self, _: &[Vec<f64>], _: &[f64]) -> Result<(), PredictorError> {
            Ok(())
        }
        fn predict(&self, _: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
            Ok(vec![0.0])
        }
    }

    /// Feature 0 equals the next log return, which alternates in sign.
    fn matrix(n: usize) -> SampleMatrix {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let samples = (0..n)
            .map(|i| {
                let r = (if i % 2 == 0 { 0.01 } else { -0.02 }) * (1.0 + i as f64 / 100.0);
                Sample {
                    features: FeatureRow {
                        date: start + Duration::days(i as i64),
                        values: vec![r, 1.0],
                    },
                    label: LabelPair::from_next_log_return(r),
                }
            })
            .collect();
        SampleMatrix::new(samples)
    }

    fn registry(entries: Vec<(&str, PredictorFactory)>) -> PredictorRegistry {
        let mut registry = PredictorRegistry::new();
        for (name, factory) in entries {
            registry.register(name, factory);
        }
        registry
    }

    #[test]
    fn test_regression_winner_and_records() {
        let registry = registry(vec![
            (
                "Zero",
                Arc::new(|| -> Box<dyn Predictor> { Box::new(ConstantModel { value: 0.0 }) }),
            ),
            (
                "Oracle",
                Arc::new(|| -> Box<dyn Predictor> { Box::new(FirstFeature) }),
            ),
        ]);
        let train = matrix(60);
        let split = WalkForwardSplit::new(train.len(), 5).unwrap();
        let eval = EvaluationHarness::new(&registry)
            .cross_validate_regression(&train, &split, RegressionObjective::Rmse)
            .unwrap();

        assert_eq!(eval.winner, "Oracle");
        assert_eq!(eval.summaries[0].predictor, "Oracle");
        assert_eq!(eval.summaries[0].metrics.rmse, 0.0);
        assert_eq!(eval.folds.len(), 10);
        assert!(eval.failures.is_empty());
    }

    #[test]
    fn test_wrong_length_output_is_a_failure() {
        let registry = registry(vec![
            (
                "Short",
                Arc::new(|| -> Box<dyn Predictor> { Box::new(ShortOutput) }),
            ),
            (
                "Zero",
                Arc::new(|| -> Box<dyn Predictor> { Box::new(ConstantModel { value: 0.0 }) }),
            ),
        ]);
        let train = matrix(40);
        let split = WalkForwardSplit::new(train.len(), 3).unwrap();
        let eval = EvaluationHarness::new(&registry)
            .cross_validate_regression(&train, &split, RegressionObjective::Mae)
            .unwrap();

        assert_eq!(eval.summaries.len(), 1);
        assert_eq!(eval.failures.len(), 1);
        assert_eq!(eval.failures[0].predictor, "Short");
        assert_eq!(eval.failures[0].fold, Some(0));
        assert!(eval.folds.iter().all(|r| r.predictor == "Zero"));
    }

    #[test]
    fn test_all_failing_halts() {
        let registry = registry(vec![(
            "Short",
            Arc::new(|| -> Box<dyn Predictor> { Box::new(ShortOutput) }),
        )]);
        let train = matrix(40);
        let split = WalkForwardSplit::new(train.len(), 3).unwrap();
        let result = EvaluationHarness::new(&registry).cross_validate_regression(
            &train,
            &split,
            RegressionObjective::Rmse,
        );
        assert!(matches!(
            result,
            Err(PipelineError::NoSurvivingPredictor { failed: 1 })
        ));
    }

    #[test]
    fn test_empty_registry_is_configuration_error() {
        let registry = PredictorRegistry::new();
        let train = matrix(20);
        let split = WalkForwardSplit::new(train.len(), 2).unwrap();
        let result = EvaluationHarness::new(&registry).cross_validate_classification(&train, &split);
        assert!(matches!(result, Err(PipelineError::Configuration { .. })));
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let registry = registry(vec![
            (
                "A",
                Arc::new(|| -> Box<dyn Predictor> { Box::new(ConstantModel { value: 1.0 }) }),
            ),
            (
                "B",
                Arc::new(|| -> Box<dyn Predictor> { Box::new(ConstantModel { value: 1.0 }) }),
            ),
        ]);
        let train = matrix(30);
        let split = WalkForwardSplit::new(train.len(), 2).unwrap();
        let eval = EvaluationHarness::new(&registry)
            .cross_validate_classification(&train, &split)
            .unwrap();
        assert_eq!(eval.winner, "A");
        assert_eq!(eval.summaries[1].predictor, "B");
    }

    #[test]
    fn test_undefined_sorts_last() {
        assert_eq!(compare_objective(None, Some(0.1), true), Ordering::Greater);
        assert_eq!(compare_objective(Some(0.2), Some(0.1), true), Ordering::Less);
        assert_eq!(compare_objective(Some(0.2), Some(0.1), false), Ordering::Greater);
    }

    #[test]
    fn test_holdout_refit() {
        let train = matrix(50);
        let holdout = matrix(10);
        let factory: PredictorFactory =
            Arc::new(|| -> Box<dyn Predictor> { Box::new(FirstFeature) });
        let result = evaluate_regression_holdout("Oracle", &factory, &train, &holdout).unwrap();
        assert_eq!(result.predicted, result.actual);
        assert_eq!(result.metrics.r2, Some(1.0));
        assert_eq!(result.dates.len(), 10);
    }
}
