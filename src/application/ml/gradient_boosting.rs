//! Gradient boosted decision trees.
//!
//! Each round fits a shallow smartcore regression tree to the negative
//! gradient of the loss on a seeded row subsample and adds it with shrinkage.
//! Squared loss for regression, log-loss for direction classification.

use super::{class_labels, sigmoid, single_class, to_dense};
use crate::domain::errors::PredictorError;
use crate::domain::ml::predictor::{Predictor, validate_training_input};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

const PROBABILITY_CLIP: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub subsample: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loss {
    Squared,
    Logistic,
}

struct BoostedTrees {
    base: f64,
    learning_rate: f64,
    trees: Vec<DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl BoostedTrees {
    fn fit(
        model: &str,
        features: &[Vec<f64>],
        targets: &[f64],
        params: &BoostingParams,
        loss: Loss,
    ) -> Result<Self, PredictorError> {
        let n = features.len();
        let x_full = to_dense(model, features)?;
        let base = match loss {
            Loss::Squared => targets.iter().sum::<f64>() / n as f64,
            Loss::Logistic => {
                let p = (targets.iter().sum::<f64>() / n as f64)
                    .clamp(PROBABILITY_CLIP, 1.0 - PROBABILITY_CLIP);
                (p / (1.0 - p)).ln()
            }
        };

        let sample_size = ((n as f64 * params.subsample).ceil() as usize).clamp(1, n);
        let tree_params = DecisionTreeRegressorParameters::default()
            .with_max_depth(params.max_depth)
            .with_min_samples_split(2)
            .with_min_samples_leaf(1);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut raw = vec![base; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = match loss {
                Loss::Squared => targets.iter().zip(&raw).map(|(y, f)| y - f).collect(),
                Loss::Logistic => targets
                    .iter()
                    .zip(&raw)
                    .map(|(y, f)| y - sigmoid(*f))
                    .collect(),
            };

            let mut rows = index::sample(&mut rng, n, sample_size).into_vec();
            rows.sort_unstable();
            let sub_features: Vec<Vec<f64>> = rows.iter().map(|&i| features[i].clone()).collect();
            let sub_residuals: Vec<f64> = rows.iter().map(|&i| residuals[i]).collect();

            let x = to_dense(model, &sub_features)?;
            let tree = DecisionTreeRegressor::fit(&x, &sub_residuals, tree_params.clone())
                .map_err(|e| PredictorError::fit(model, e))?;
            let step = tree
                .predict(&x_full)
                .map_err(|e| PredictorError::fit(model, e))?;
            for (f, s) in raw.iter_mut().zip(step) {
                *f += params.learning_rate * s;
            }
            trees.push(tree);
        }

        Ok(Self {
            base,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    fn raw_scores(&self, model: &str, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        let x = to_dense(model, features)?;
        let mut raw = vec![self.base; features.len()];
        for tree in &self.trees {
            let step = tree
                .predict(&x)
                .map_err(|e| PredictorError::predict(model, e))?;
            for (f, s) in raw.iter_mut().zip(step) {
                *f += self.learning_rate * s;
            }
        }
        Ok(raw)
    }
}

pub struct GradientBoostingPredictor {
    params: BoostingParams,
    model: Option<BoostedTrees>,
}

impl GradientBoostingPredictor {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            model: None,
        }
    }
}

impl Predictor for GradientBoostingPredictor {
    fn name(&self) -> &str {
        "GradientBoosting"
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictorError> {
        validate_training_input(self.name(), features, targets)?;
        self.model = Some(BoostedTrees::fit(
            self.name(),
            features,
            targets,
            &self.params,
            Loss::Squared,
        )?);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        let model = self.model.as_ref().ok_or_else(|| PredictorError::NotFitted {
            model: self.name().to_string(),
        })?;
        model.raw_scores(self.name(), features)
    }
}

enum FittedBoostingClassifier {
    Constant(i32),
    Trees(BoostedTrees),
}

pub struct GradientBoostingClassifierPredictor {
    params: BoostingParams,
    fitted: Option<FittedBoostingClassifier>,
}

impl GradientBoostingClassifierPredictor {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    fn probabilities(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        match &self.fitted {
            None => Err(PredictorError::NotFitted {
                model: self.name().to_string(),
            }),
            Some(FittedBoostingClassifier::Constant(class)) => {
                Ok(vec![f64::from(*class); features.len()])
            }
            Some(FittedBoostingClassifier::Trees(trees)) => Ok(trees
                .raw_scores(self.name(), features)?
                .into_iter()
                .map(sigmoid)
                .collect()),
        }
    }
}

impl Predictor for GradientBoostingClassifierPredictor {
    fn name(&self) -> &str {
        "GBClassifier"
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictorError> {
        validate_training_input(self.name(), features, targets)?;
        let labels = class_labels(targets);
        if let Some(class) = single_class(&labels) {
            self.fitted = Some(FittedBoostingClassifier::Constant(class));
            return Ok(());
        }
        let binary: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        self.fitted = Some(FittedBoostingClassifier::Trees(BoostedTrees::fit(
            self.name(),
            features,
            &binary,
            &self.params,
            Loss::Logistic,
        )?));
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

    fn params() -> BoostingParams {
        BoostingParams {
            n_estimators: 50,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 0.8,
            seed: 7,
        }
    }

    #[test]
    fn test_regressor_fits_quadratic() {
        let features: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64 / 10.0]).collect();
        let targets: Vec<f64> = features.iter().map(|r| r[0] * r[0]).collect();
        let mut gb = GradientBoostingPredictor::new(params());
        gb.fit(&features, &targets).unwrap();
        let preds = gb.predict(&features).unwrap();
        let mse: f64 = preds
            .iter()
            .zip(&targets)
            .map(|(p, y)| (p - y).powi(2))
            .sum::<f64>()
            / targets.len() as f64;
        let variance = {
            let m = targets.iter().sum::<f64>() / targets.len() as f64;
            targets.iter().map(|y| (y - m).powi(2)).sum::<f64>() / targets.len() as f64
        };
        assert!(mse < 0.1 * variance);
    }

    #[test]
    fn test_seeded_runs_match() {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let targets: Vec<f64> = features.iter().map(|r| r[1] - r[0] * 0.1).collect();
        let mut a = GradientBoostingPredictor::new(params());
        let mut b = GradientBoostingPredictor::new(params());
        a.fit(&features, &targets).unwrap();
        b.fit(&features, &targets).unwrap();
        assert_eq!(a.predict(&features).unwrap(), b.predict(&features).unwrap());
    }

    #[test]
    fn test_classifier_probabilities_separate_classes() {
        let features: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..60).map(|i| if i >= 30 { 1.0 } else { 0.0 }).collect();
        let mut gb = GradientBoostingClassifierPredictor::new(params());
        gb.fit(&features, &targets).unwrap();
        let probs = gb
            .predict_probability(&[vec![3.0], vec![57.0]])
            .unwrap()
            .unwrap();
        assert!(probs[0] < 0.5);
        assert!(probs[1] > 0.5);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_classifier_single_class() {
        let features = vec![vec![1.0, 2.0]; 8];
        let mut gb = GradientBoostingClassifierPredictor::new(params());
        gb.fit(&features, &[1.0; 8]).unwrap();
        let probs = gb.predict_probability(&features).unwrap().unwrap();
        assert_eq!(probs, vec![1.0; 8]);
    }
}
