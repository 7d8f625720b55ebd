//! Predictor hyperparameters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    // Linear models
    pub ridge_alpha: f64,
    pub logistic_alpha: f64,

    // Random forests
    pub n_trees: usize,
    pub forest_max_depth: Option<u16>,
    pub min_samples_split: usize,

    // Gradient boosting
    pub boosting_rounds: usize,
    pub learning_rate: f64,
    pub boosting_max_depth: u16,
    pub subsample: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            ridge_alpha: 1.0,
            logistic_alpha: 1.0,
            n_trees: 100,
            forest_max_depth: None,
            min_samples_split: 2,
            boosting_rounds: 100,
            learning_rate: 0.1,
            boosting_max_depth: 3,
            subsample: 0.8,
        }
    }
}

impl ModelParams {
    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.ridge_alpha.is_nan() || self.ridge_alpha < 0.0 {
            problems.push(format!("ridge_alpha must be >= 0, got {}", self.ridge_alpha));
        }
        if self.logistic_alpha.is_nan() || self.logistic_alpha < 0.0 {
            problems.push(format!(
                "logistic_alpha must be >= 0, got {}",
                self.logistic_alpha
            ));
        }
        if self.n_trees == 0 || self.n_trees > usize::from(u16::MAX) {
            problems.push(format!("n_trees must be in [1, 65535], got {}", self.n_trees));
        }
        if self.min_samples_split < 2 {
            problems.push(format!(
                "min_samples_split must be >= 2, got {}",
                self.min_samples_split
            ));
        }
        if self.boosting_rounds == 0 {
            problems.push("boosting_rounds must be >= 1".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            problems.push(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            ));
        }
        if self.boosting_max_depth == 0 {
            problems.push("boosting_max_depth must be >= 1".to_string());
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            problems.push(format!("subsample must be in (0, 1], got {}", self.subsample));
        }
        problems
    }
}
