use super::scaler::StandardScaler;
use super::to_dense;
use crate::domain::errors::PredictorError;
use crate::domain::ml::predictor::{Predictor, validate_training_input};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::ridge_regression::{RidgeRegression, RidgeRegressionParameters};

struct FittedRidge {
    scaler: StandardScaler,
    target_mean: f64,
    model: RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

/// Ridge regression on standardized features.
///
/// The target is centered before fitting and its mean added back on predict,
/// which gives an unpenalized intercept.
///
/// smartcore's ridge needs more rows than columns. Narrower training sets are
/// solved as the equivalent least-squares problem `[X; sqrt(alpha) I] w = [y; 0]`
/// with no further penalty.
pub struct RidgePredictor {
    alpha: f64,
    fitted: Option<FittedRidge>,
}

impl RidgePredictor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }
}

impl Predictor for RidgePredictor {
    fn name(&self) -> &str {
        "Ridge"
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictorError> {
        validate_training_input(self.name(), features, targets)?;

        let scaler = StandardScaler::fit(features);
        let mut rows = scaler.transform(features);
        let target_mean = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut centered: Vec<f64> = targets.iter().map(|y| y - target_mean).collect();

        let width = rows.first().map_or(0, Vec::len);
        let mut alpha = self.alpha;
        if rows.len() <= width {
            augment_with_penalty(&mut rows, &mut centered, width, alpha);
            alpha = 0.0;
        }

        let x = to_dense(self.name(), &rows)?;
        let params = RidgeRegressionParameters::default()
            .with_alpha(alpha)
            .with_normalize(false);
        let model = RidgeRegression::fit(&x, &centered, params)
            .map_err(|e| PredictorError::fit(self.name(), e))?;

        self.fitted = Some(FittedRidge {
            scaler,
            target_mean,
            model,
        });
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        let fitted = self.fitted.as_ref().ok_or_else(|| PredictorError::NotFitted {
            model: self.name().to_string(),
        })?;
        let x = to_dense(self.name(), &fitted.scaler.transform(features))?;
        let predictions = fitted
            .model
            .predict(&x)
            .map_err(|e| PredictorError::predict(self.name(), e))?;
        Ok(predictions
            .into_iter()
            .map(|p| p + fitted.target_mean)
            .collect())
    }
}

/// Appends one `sqrt(alpha) * e_j` row per column with a zero target.
fn augment_with_penalty(
    rows: &mut Vec<Vec<f64>>,
    targets: &mut Vec<f64>,
    width: usize,
    alpha: f64,
) {
    let scale = alpha.max(0.0).sqrt();
    for j in 0..width {
        let mut row = vec![0.0; width];
        row[j] = scale;
        rows.push(row);
        targets.push(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_linear_signal() {
        let features: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![i as f64, ((i * 7) % 11) as f64])
            .collect();
        let targets: Vec<f64> = features.iter().map(|r| 0.5 * r[0] + 2.0).collect();

        let mut ridge = RidgePredictor::new(1e-6);
        ridge.fit(&features, &targets).unwrap();
        let preds = ridge.predict(&[vec![10.0, 3.0], vec![30.0, 5.0]]).unwrap();
        assert!((preds[0] - 7.0).abs() < 1e-3);
        assert!((preds[1] - 17.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_features_predict_target_mean() {
        let features = vec![vec![1.0, 1.0]; 10];
        let targets = vec![0.0; 10];
        let mut ridge = RidgePredictor::new(1.0);
        ridge.fit(&features, &targets).unwrap();
        let preds = ridge.predict(&features[..2]).unwrap();
        assert!(preds.iter().all(|p| p.abs() < 1e-12));
    }

    fn wide_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                (0..40)
                    .map(|j| (((i + 1) * (j + 3)) % 17) as f64 + 0.1 * i as f64)
                    .collect()
            })
            .collect();
        let targets = features.iter().map(|r| 0.3 * r[0] - 0.1 * r[5]).collect();
        (features, targets)
    }

    #[test]
    fn test_fits_more_columns_than_rows() {
        let (features, targets) = wide_data();
        let mut ridge = RidgePredictor::new(1.0);
        ridge.fit(&features, &targets).unwrap();
        let preds = ridge.predict(&features).unwrap();
        assert_eq!(preds.len(), 20);

        let mean = targets.iter().sum::<f64>() / 20.0;
        let sse: f64 = preds.iter().zip(&targets).map(|(p, y)| (p - y).powi(2)).sum();
        let sst: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();
        assert!(preds.iter().all(|p| p.is_finite()));
        assert!(sse < sst);
    }

    #[test]
    fn test_heavy_penalty_on_wide_data_shrinks_to_mean() {
        let (features, targets) = wide_data();
        let mut ridge = RidgePredictor::new(1e9);
        ridge.fit(&features, &targets).unwrap();
        let mean = targets.iter().sum::<f64>() / 20.0;
        let preds = ridge.predict(&features).unwrap();
        assert!(preds.iter().all(|p| (p - mean).abs() < 1e-3));
    }

    #[test]
    fn test_augmented_rows_carry_penalty() {
        let mut rows = vec![vec![1.0, 2.0]];
        let mut targets = vec![3.0];
        augment_with_penalty(&mut rows, &mut targets, 2, 4.0);
        assert_eq!(rows, vec![vec![1.0, 2.0], vec![2.0, 0.0], vec![0.0, 2.0]]);
        assert_eq!(targets, vec![3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_predict_before_fit() {
        let ridge = RidgePredictor::new(1.0);
        assert!(matches!(
            ridge.predict(&[vec![1.0]]),
            Err(PredictorError::NotFitted { .. })
        ));
    }
}
