//! Decision threshold search on pooled out-of-fold classifier scores.
//!
//! Scores from every validation block are concatenated and swept once, rather
//! than tuned per fold and averaged.

use super::harness::{checked_scores, direction_targets};
use crate::application::ml::ScoreSource;
use crate::domain::errors::PipelineError;
use crate::domain::ml::{PredictorFactory, SampleMatrix};
use crate::domain::performance::metrics::{ClassificationMetrics, ConfusionMatrix, apply_threshold};
use crate::domain::validation::WalkForwardSplit;
use serde::Serialize;
use tracing::{debug, info};

pub const THRESHOLD_MIN: f64 = 0.05;
pub const THRESHOLD_MAX: f64 = 0.95;
pub const THRESHOLD_STEPS: usize = 181;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub metrics: ClassificationMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdSelection {
    pub predictor: String,
    pub best: ThresholdPoint,
    pub sweep: Vec<ThresholdPoint>,
    pub pooled_samples: usize,
    pub score_source: ScoreSource,
}

impl ThresholdSelection {
    pub fn threshold(&self) -> f64 {
        self.best.threshold
    }
}

pub struct ThresholdOptimizer;

impl ThresholdOptimizer {
    /// The 181 candidate thresholds, 0.05 to 0.95 inclusive.
    pub fn grid() -> Vec<f64> {
        let step = (THRESHOLD_MAX - THRESHOLD_MIN) / (THRESHOLD_STEPS - 1) as f64;
        (0..THRESHOLD_STEPS)
            .map(|i| THRESHOLD_MIN + step * i as f64)
            .collect()
    }

    /// Metrics at every grid threshold.
    pub fn sweep(labels: &[u8], scores: &[f64]) -> Vec<ThresholdPoint> {
        Self::grid()
            .into_iter()
            .map(|threshold| {
                let confusion =
                    ConfusionMatrix::from_labels(labels, &apply_threshold(scores, threshold));
                ThresholdPoint {
                    threshold,
                    confusion,
                    metrics: ClassificationMetrics::from_confusion(&confusion),
                }
            })
            .collect()
    }

    /// Highest F1, then highest accuracy, then lowest threshold.
    pub fn select(sweep: &[ThresholdPoint]) -> Option<ThresholdPoint> {
        let mut best: Option<ThresholdPoint> = None;
        for point in sweep {
            let better = match &best {
                None => true,
                Some(b) => {
                    point.metrics.f1 > b.metrics.f1
                        || (point.metrics.f1 == b.metrics.f1
                            && point.metrics.accuracy > b.metrics.accuracy)
                }
            };
            if better {
                best = Some(*point);
            }
        }
        best
    }

    /// Fit a fresh classifier per fold, pool the validation scores, and pick the threshold.
    ///
    /// Folds are pooled unweighted, so early folds (smaller training sets) count
    /// as much per row as late ones.
    pub fn optimize(
        name: &str,
        factory: &PredictorFactory,
        train: &SampleMatrix,
        split: &WalkForwardSplit,
    ) -> Result<ThresholdSelection, PipelineError> {
        let mut labels = Vec::new();
        let mut scores = Vec::new();
        let mut score_source = ScoreSource::Probability;

        for fold in split {
            let mut predictor = factory();
            predictor.fit(
                &train.features(fold.train.clone()),
                &direction_targets(train, fold.train.clone()),
            )?;
            let (fold_scores, source) =
                checked_scores(predictor.as_ref(), &train.features(fold.validation.clone()))?;
            debug!(
                "Threshold fold {}: {} out-of-fold scores ({:?})",
                fold.index,
                fold_scores.len(),
                source
            );
            score_source = source;
            labels.extend(train.next_directions(fold.validation.clone()));
            scores.extend(fold_scores);
        }

        let sweep = Self::sweep(&labels, &scores);
        let best = Self::select(&sweep).ok_or_else(|| PipelineError::DataInsufficiency {
            available: labels.len(),
            required: 1,
            reason: "no out-of-fold scores to tune a threshold on".to_string(),
        })?;
        info!(
            "Tuned threshold for {}: tau={:.3} (F1={:.4}, accuracy={:.4}, {} pooled samples)",
            name,
            best.threshold,
            best.metrics.f1,
            best.metrics.accuracy,
            labels.len()
        );

        Ok(ThresholdSelection {
            predictor: name.to_string(),
            best,
            sweep,
            pooled_samples: labels.len(),
            score_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shape() {
        let grid = ThresholdOptimizer::grid();
        assert_eq!(grid.len(), 181);
        assert_eq!(grid[0], 0.05);
        assert!((grid[180] - 0.95).abs() < 1e-12);
        assert!((grid[1] - grid[0] - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_separation_reaches_f1_one() {
        let labels = [0, 0, 0, 1, 1, 1];
        let scores = [0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
        let sweep = ThresholdOptimizer::sweep(&labels, &scores);
        let best = ThresholdOptimizer::select(&sweep).unwrap();
        assert_eq!(best.metrics.f1, 1.0);
        assert_eq!(best.metrics.accuracy, 1.0);
        // lowest threshold achieving the separation
        assert!(best.threshold > 0.3 && best.threshold < 0.31);
    }

    #[test]
    fn test_ties_prefer_lowest_threshold() {
        // Every threshold classifies all rows as up
        let labels = [1, 1, 0];
        let scores = [1.0, 1.0, 1.0];
        let sweep = ThresholdOptimizer::sweep(&labels, &scores);
        let best = ThresholdOptimizer::select(&sweep).unwrap();
        assert_eq!(best.threshold, 0.05);
    }

    #[test]
    fn test_accuracy_breaks_f1_ties() {
        let a = ThresholdPoint {
            threshold: 0.2,
            confusion: ConfusionMatrix::default(),
            metrics: ClassificationMetrics {
                accuracy: 0.5,
                precision: 0.5,
                recall: 0.5,
                f1: 0.5,
            },
        };
        let b = ThresholdPoint {
            threshold: 0.6,
            metrics: ClassificationMetrics {
                accuracy: 0.7,
                ..a.metrics
            },
            ..a
        };
        assert_eq!(ThresholdOptimizer::select(&[a, b]).unwrap().threshold, 0.6);
        assert!(ThresholdOptimizer::select(&[]).is_none());
    }
}
