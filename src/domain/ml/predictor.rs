use crate::domain::errors::PredictorError;
use std::sync::Arc;

/// Interface for Machine Learning models.
///
/// Classifiers are trained on 0.0/1.0 targets and `predict` returns hard
/// 0.0/1.0 decisions. Scoring capabilities are optional; callers fall back
/// from probability to decision score to hard prediction.
pub trait Predictor: Send {
    /// Get model name/type
    fn name(&self) -> &str;

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictorError>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError>;

    /// Probability of the positive class (0.0 to 1.0), if the model exposes one.
    fn predict_probability(
        &self,
        _features: &[Vec<f64>],
    ) -> Option<Result<Vec<f64>, PredictorError>> {
        None
    }

    /// Unbounded confidence score, larger means more likely positive.
    fn decision_function(
        &self,
        _features: &[Vec<f64>],
    ) -> Option<Result<Vec<f64>, PredictorError>> {
        None
    }
}

/// Creates a fresh, unfitted predictor. Every fit in a run goes through a new instance.
pub type PredictorFactory = Arc<dyn Fn() -> Box<dyn Predictor> + Send + Sync>;

/// Shared input checks for predictor implementations.
pub fn validate_training_input(
    model: &str,
    features: &[Vec<f64>],
    targets: &[f64],
) -> Result<(), PredictorError> {
    if features.is_empty() {
        return Err(PredictorError::InvalidInput {
            model: model.to_string(),
            reason: "no training rows".to_string(),
        });
    }
    if features.len() != targets.len() {
        return Err(PredictorError::InvalidInput {
            model: model.to_string(),
            reason: format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            ),
        });
    }
    Ok(())
}
