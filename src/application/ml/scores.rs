use crate::domain::errors::PredictorError;
use crate::domain::ml::Predictor;
use serde::Serialize;
use tracing::debug;

/// Denominator guard for min-max normalization of decision scores.
const SCORE_EPSILON: f64 = 1e-12;

/// Where a classifier's positive-class scores came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreSource {
    Probability,
    DecisionFunction,
    HardPrediction,
}

/// Positive-class scores in [0, 1].
///
/// Falls back from probability to min-max normalized decision scores to raw
/// 0/1 predictions, in that order.
pub fn positive_scores(
    predictor: &dyn Predictor,
    features: &[Vec<f64>],
) -> Result<(Vec<f64>, ScoreSource), PredictorError> {
    match predictor.predict_probability(features) {
        Some(Ok(probabilities)) => return Ok((probabilities, ScoreSource::Probability)),
        Some(Err(e)) => debug!(
            "{}: probability unavailable ({}), falling back",
            predictor.name(),
            e
        ),
        None => {}
    }

    match predictor.decision_function(features) {
        Some(Ok(scores)) => return Ok((min_max(&scores), ScoreSource::DecisionFunction)),
        Some(Err(e)) => debug!(
            "{}: decision scores unavailable ({}), falling back",
            predictor.name(),
            e
        ),
        None => {}
    }

    Ok((predictor.predict(features)?, ScoreSource::HardPrediction))
}

fn min_max(scores: &[f64]) -> Vec<f64> {
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    scores
        .iter()
        .map(|s| (s - min) / (max - min + SCORE_EPSILON))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MarginOnly;

    impl Predictor for MarginOnly {
        fn name(&self) -> &str {
            "MarginOnly"
        }
        fn fit(&mut self, _: &[Vec<f64>], _: &[f64]) -> Result<(), PredictorError> {
            Ok(())
        }
        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
            Ok(features
                .iter()
                .map(|r| if r[0] > 0.0 { 1.0 } else { 0.0 })
                .collect())
        }
        fn decision_function(
            &self,
            features: &[Vec<f64>],
        ) -> Option<Result<Vec<f64>, PredictorError>> {
            Some(Ok(features.iter().map(|r| r[0]).collect()))
        }
    }

    struct HardOnly;

    impl Predictor for HardOnly {
        fn name(&self) -> &str {
            "HardOnly"
        }
        fn fit(&mut self, _: &[Vec<f64>], _: &[f64]) -> Result<(), PredictorError> {
            Ok(())
        }
        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
            Ok(vec![1.0; features.len()])
        }
    }

    #[test]
    fn test_decision_scores_are_min_max_normalized() {
        let rows = vec![vec![-2.0], vec![0.0], vec![2.0]];
        let (scores, source) = positive_scores(&MarginOnly, &rows).unwrap();
        assert_eq!(source, ScoreSource::DecisionFunction);
        assert_eq!(scores[0], 0.0);
        assert!((scores[1] - 0.5).abs() < 1e-9);
        assert!(scores[2] < 1.0 && scores[2] > 0.999_999);
    }

    #[test]
    fn test_falls_back_to_hard_predictions() {
        let (scores, source) = positive_scores(&HardOnly, &[vec![0.0], vec![1.0]]).unwrap();
        assert_eq!(source, ScoreSource::HardPrediction);
        assert_eq!(scores, vec![1.0, 1.0]);
    }

    #[test]
    fn test_constant_decision_scores_map_to_zero() {
        let (scores, _) = positive_scores(&MarginOnly, &[vec![3.0], vec![3.0]]).unwrap();
        assert_eq!(scores, vec![0.0, 0.0]);
    }
}
