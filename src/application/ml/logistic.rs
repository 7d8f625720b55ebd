use super::scaler::StandardScaler;
use super::{class_labels, sigmoid, single_class, to_dense};
use crate::domain::errors::PredictorError;
use crate::domain::ml::predictor::{Predictor, validate_training_input};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};

enum FittedLogistic {
    Constant(i32),
    Linear {
        scaler: StandardScaler,
        weights: Vec<f64>,
        intercept: f64,
    },
}

/// L2-regularized logistic regression on standardized features.
///
/// smartcore fits the coefficients; the positive-class probability is the
/// sigmoid of the fitted linear score.
pub struct LogisticPredictor {
    alpha: f64,
    fitted: Option<FittedLogistic>,
}

impl LogisticPredictor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }

    fn probabilities(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        match &self.fitted {
            None => Err(PredictorError::NotFitted {
                model: self.name().to_string(),
            }),
            Some(FittedLogistic::Constant(class)) => Ok(vec![f64::from(*class); features.len()]),
            Some(FittedLogistic::Linear {
                scaler,
                weights,
                intercept,
            }) => {
                let scaled = scaler.transform(features);
                scaled
                    .iter()
                    .map(|row| {
                        if row.len() != weights.len() {
                            return Err(PredictorError::InvalidInput {
                                model: self.name().to_string(),
                                reason: format!(
                                    "expected {} features, got {}",
                                    weights.len(),
                                    row.len()
                                ),
                            });
                        }
                        let score: f64 =
                            intercept + row.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>();
                        Ok(sigmoid(score))
                    })
                    .collect()
            }
        }
    }
}

impl Predictor for LogisticPredictor {
    fn name(&self) -> &str {
        "Logistic"
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictorError> {
        validate_training_input(self.name(), features, targets)?;
        let labels = class_labels(targets);
        if let Some(class) = single_class(&labels) {
            self.fitted = Some(FittedLogistic::Constant(class));
            return Ok(());
        }

        let scaler = StandardScaler::fit(features);
        let x = to_dense(self.name(), &scaler.transform(features))?;
        let params = LogisticRegressionParameters::default().with_alpha(self.alpha);
        let model = LogisticRegression::fit(&x, &labels, params)
            .map_err(|e| PredictorError::fit(self.name(), e))?;

        let coefficients = model.coefficients();
        let (rows, cols) = coefficients.shape();
        let weights: Vec<f64> = if rows == 1 {
            (0..cols).map(|j| *coefficients.get((0, j))).collect()
        } else {
            (0..rows).map(|i| *coefficients.get((i, 0))).collect()
        };
        let intercept = *model.intercept().get((0, 0));

        self.fitted = Some(FittedLogistic::Linear {
            scaler,
            weights,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        Ok(self
            .probabilities(features)?
            .into_iter()
            .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect())
    }

    fn predict_probability(
        &self,
        features: &[Vec<f64>],
    ) -> Option<Result<Vec<f64>, PredictorError>> {
        Some(self.probabilities(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_increases_with_signal() {
        let features: Vec<Vec<f64>> = (0..100)
            .map(|i| vec![i as f64, ((i * 13) % 7) as f64])
            .collect();
        let targets: Vec<f64> = (0..100)
            .map(|i| if (i * 37) % 100 < i { 1.0 } else { 0.0 })
            .collect();
        let mut logistic = LogisticPredictor::new(1.0);
        logistic.fit(&features, &targets).unwrap();

        let probs = logistic
            .predict_probability(&[vec![0.0, 3.0], vec![99.0, 3.0]])
            .unwrap()
            .unwrap();
        assert!(probs[0] < probs[1]);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_single_class_predicts_constant() {
        let features = vec![vec![0.5, 1.5]; 12];
        let mut logistic = LogisticPredictor::new(1.0);
        logistic.fit(&features, &[0.0; 12]).unwrap();
        assert_eq!(logistic.predict(&features[..2]).unwrap(), vec![0.0, 0.0]);
        let probs = logistic.predict_probability(&features[..2]).unwrap().unwrap();
        assert_eq!(probs, vec![0.0, 0.0]);
    }

    #[test]
    fn test_unfitted_probability_is_error() {
        let logistic = LogisticPredictor::new(1.0);
        assert!(matches!(
            logistic.predict_probability(&[vec![1.0]]),
            Some(Err(PredictorError::NotFitted { .. }))
        ));
    }
}
