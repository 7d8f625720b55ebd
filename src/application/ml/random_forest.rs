use super::{class_labels, single_class, to_dense};
use crate::domain::errors::PredictorError;
use crate::domain::ml::predictor::{Predictor, validate_training_input};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub seed: u64,
}

pub struct RandomForestPredictor {
    params: ForestParams,
    model: Option<RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl RandomForestPredictor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            model: None,
        }
    }
}

impl Predictor for RandomForestPredictor {
    fn name(&self) -> &str {
        "RandomForest"
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictorError> {
        validate_training_input(self.name(), features, targets)?;
        let x = to_dense(self.name(), features)?;

        let mut params = RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees)
            .with_min_samples_split(self.params.min_samples_split)
            .with_seed(self.params.seed);
        if let Some(depth) = self.params.max_depth {
            params = params.with_max_depth(depth);
        }

        let model = RandomForestRegressor::fit(&x, &targets.to_vec(), params)
            .map_err(|e| PredictorError::fit(self.name(), e))?;
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        let model = self.model.as_ref().ok_or_else(|| PredictorError::NotFitted {
            model: self.name().to_string(),
        })?;
        let x = to_dense(self.name(), features)?;
        model
            .predict(&x)
            .map_err(|e| PredictorError::predict(self.name(), e))
    }
}

enum FittedForestClassifier {
    Constant(i32),
    Forest(RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>),
}

/// Random forest on direction labels. Exposes hard decisions only, so
/// threshold search sees 0/1 scores.
///
/// smartcore hands every tree of the classifier the same seed, so the trees
/// draw the same feature subsets. On narrow inputs the forest behaves like a
/// single tree restricted to `sqrt(p)` columns.
pub struct RandomForestClassifierPredictor {
    params: ForestParams,
    fitted: Option<FittedForestClassifier>,
}

impl RandomForestClassifierPredictor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }
}

impl Predictor for RandomForestClassifierPredictor {
    fn name(&self) -> &str {
        "RFClassifier"
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictorError> {
        validate_training_input(self.name(), features, targets)?;
        let labels = class_labels(targets);
        if let Some(class) = single_class(&labels) {
            self.fitted = Some(FittedForestClassifier::Constant(class));
            return Ok(());
        }

        let x = to_dense(self.name(), features)?;
        let n_trees = u16::try_from(self.params.n_trees).unwrap_or(u16::MAX);
        let mut params = RandomForestClassifierParameters::default()
            .with_n_trees(n_trees)
            .with_min_samples_split(self.params.min_samples_split)
            .with_seed(self.params.seed);
        if let Some(depth) = self.params.max_depth {
            params = params.with_max_depth(depth);
        }

        let model = RandomForestClassifier::fit(&x, &labels, params)
            .map_err(|e| PredictorError::fit(self.name(), e))?;
        self.fitted = Some(FittedForestClassifier::Forest(model));
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, PredictorError> {
        match &self.fitted {
            None => Err(PredictorError::NotFitted {
                model: self.name().to_string(),
            }),
            Some(FittedForestClassifier::Constant(class)) => {
                Ok(vec![f64::from(*class); features.len()])
            }
            Some(FittedForestClassifier::Forest(model)) => {
                let x = to_dense(self.name(), features)?;
                let classes = model
                    .predict(&x)
                    .map_err(|e| PredictorError::predict(self.name(), e))?;
                Ok(classes.into_iter().map(f64::from).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ForestParams {
        ForestParams {
            n_trees: 20,
            max_depth: Some(4),
            min_samples_split: 2,
            seed: 42,
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..80).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let targets = features
            .iter()
            .map(|r| if r[0] < 40.0 { 0.0 } else { 1.0 })
            .collect();
        (features, targets)
    }

    #[test]
    fn test_regressor_learns_step() {
        let (features, targets) = step_data();
        let mut forest = RandomForestPredictor::new(params());
        forest.fit(&features, &targets).unwrap();
        let preds = forest.predict(&[vec![5.0, 2.0], vec![75.0, 0.0]]).unwrap();
        assert!(preds[0] < 0.3);
        assert!(preds[1] > 0.7);
    }

    #[test]
    fn test_regressor_is_deterministic_for_seed() {
        let (features, targets) = step_data();
        let mut a = RandomForestPredictor::new(params());
        let mut b = RandomForestPredictor::new(params());
        a.fit(&features, &targets).unwrap();
        b.fit(&features, &targets).unwrap();
        assert_eq!(
            a.predict(&features).unwrap(),
            b.predict(&features).unwrap()
        );
    }

    /// Every column carries the step, whichever subset the trees draw.
    fn wide_step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..200)
            .map(|i| (1..=6).map(|k| (i * k) as f64).collect())
            .collect();
        let targets = (0..200).map(|i| if i < 100 { 0.0 } else { 1.0 }).collect();
        (features, targets)
    }

    #[test]
    fn test_classifier_has_no_probability() {
        let (features, targets) = wide_step_data();
        let mut forest = RandomForestClassifierPredictor::new(params());
        forest.fit(&features, &targets).unwrap();
        assert!(forest.predict_probability(&features).is_none());
        let preds = forest.predict(&[features[5].clone(), features[195].clone()]).unwrap();
        assert_eq!(preds, vec![0.0, 1.0]);
    }

    #[test]
    fn test_classifier_fits_training_step() {
        let (features, targets) = wide_step_data();
        let mut forest = RandomForestClassifierPredictor::new(params());
        forest.fit(&features, &targets).unwrap();
        let preds = forest.predict(&features).unwrap();
        let correct = preds.iter().zip(&targets).filter(|(p, t)| p == t).count();
        assert!(correct >= 190, "only {} of 200 correct", correct);
    }

    #[test]
    fn test_classifier_single_class() {
        let features = vec![vec![1.0]; 10];
        let mut forest = RandomForestClassifierPredictor::new(params());
        forest.fit(&features, &[0.0; 10]).unwrap();
        assert_eq!(forest.predict(&features[..3]).unwrap(), vec![0.0; 3]);
    }
}
