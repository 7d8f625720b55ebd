use thiserror::Error;

/// Errors that halt a forecasting run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Insufficient data: {available} usable rows, need at least {required} ({reason})")]
    DataInsufficiency {
        available: usize,
        required: usize,
        reason: String,
    },

    #[error("Invalid input data: {reason}")]
    DataFormat { reason: String },

    #[error("No predictor survived evaluation ({failed} failed)")]
    NoSurvivingPredictor { failed: usize },

    #[error(transparent)]
    Predictor(#[from] PredictorError),
}

impl PipelineError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        PipelineError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn data_format(reason: impl Into<String>) -> Self {
        PipelineError::DataFormat {
            reason: reason.into(),
        }
    }
}

/// Errors raised by an individual predictor. These are isolated per predictor
/// during cross-validation and only become fatal when the selected winner fails.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("{model} failed to fit: {reason}")]
    Fit { model: String, reason: String },

    #[error("{model} failed to predict: {reason}")]
    Predict { model: String, reason: String },

    #[error("{model} used before fit")]
    NotFitted { model: String },

    #[error("{model} received invalid input: {reason}")]
    InvalidInput { model: String, reason: String },
}

impl PredictorError {
    pub fn fit(model: &str, reason: impl std::fmt::Display) -> Self {
        PredictorError::Fit {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn predict(model: &str, reason: impl std::fmt::Display) -> Self {
        PredictorError::Predict {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_insufficiency_formatting() {
        let error = PipelineError::DataInsufficiency {
            available: 12,
            required: 200,
            reason: "series shorter than longest lookback".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("200"));
    }

    #[test]
    fn test_predictor_error_converts_into_pipeline_error() {
        let error: PipelineError = PredictorError::fit("Ridge", "singular matrix").into();
        let msg = error.to_string();
        assert!(msg.contains("Ridge"));
        assert!(msg.contains("singular matrix"));
    }
}
