use super::gradient_boosting::{
    BoostingParams, GradientBoostingClassifierPredictor, GradientBoostingPredictor,
};
use super::logistic::LogisticPredictor;
use super::random_forest::{ForestParams, RandomForestClassifierPredictor, RandomForestPredictor};
use super::ridge::RidgePredictor;
use crate::config::ModelParams;
use crate::domain::ml::{Predictor, PredictorFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Built-in predictor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictorKind {
    Ridge,
    RandomForest,
    GradientBoosting,
    Logistic,
    #[serde(rename = "RFClassifier")]
    RandomForestClassifier,
    #[serde(rename = "GBClassifier")]
    GradientBoostingClassifier,
}

impl PredictorKind {
    pub const REGRESSORS: [PredictorKind; 3] = [
        PredictorKind::Ridge,
        PredictorKind::RandomForest,
        PredictorKind::GradientBoosting,
    ];

    pub const CLASSIFIERS: [PredictorKind; 3] = [
        PredictorKind::Logistic,
        PredictorKind::RandomForestClassifier,
        PredictorKind::GradientBoostingClassifier,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PredictorKind::Ridge => "Ridge",
            PredictorKind::RandomForest => "RandomForest",
            PredictorKind::GradientBoosting => "GradientBoosting",
            PredictorKind::Logistic => "Logistic",
            PredictorKind::RandomForestClassifier => "RFClassifier",
            PredictorKind::GradientBoostingClassifier => "GBClassifier",
        }
    }

    pub fn is_classifier(self) -> bool {
        Self::CLASSIFIERS.contains(&self)
    }

    /// Factory producing fresh, unfitted instances with the given hyperparameters.
    pub fn factory(self, params: &ModelParams, seed: u64) -> PredictorFactory {
        let forest = ForestParams {
            n_trees: params.n_trees,
            max_depth: params.forest_max_depth,
            min_samples_split: params.min_samples_split,
            seed,
        };
        let boosting = BoostingParams {
            n_estimators: params.boosting_rounds,
            learning_rate: params.learning_rate,
            max_depth: params.boosting_max_depth,
            subsample: params.subsample,
            seed,
        };
        let ridge_alpha = params.ridge_alpha;
        let logistic_alpha = params.logistic_alpha;

        match self {
            PredictorKind::Ridge => boxed(move || RidgePredictor::new(ridge_alpha)),
            PredictorKind::RandomForest => boxed(move || RandomForestPredictor::new(forest)),
            PredictorKind::GradientBoosting => {
                boxed(move || GradientBoostingPredictor::new(boosting))
            }
            PredictorKind::Logistic => boxed(move || LogisticPredictor::new(logistic_alpha)),
            PredictorKind::RandomForestClassifier => {
                boxed(move || RandomForestClassifierPredictor::new(forest))
            }
            PredictorKind::GradientBoostingClassifier => {
                boxed(move || GradientBoostingClassifierPredictor::new(boosting))
            }
        }
    }
}

fn boxed<P, F>(make: F) -> PredictorFactory
where
    P: Predictor + 'static,
    F: Fn() -> P + Send + Sync + 'static,
{
    Arc::new(move || -> Box<dyn Predictor> { Box::new(make()) })
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PredictorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ridge" => Ok(PredictorKind::Ridge),
            "randomforest" | "rf" => Ok(PredictorKind::RandomForest),
            "gradientboosting" | "gb" => Ok(PredictorKind::GradientBoosting),
            "logistic" => Ok(PredictorKind::Logistic),
            "rfclassifier" | "randomforestclassifier" => {
                Ok(PredictorKind::RandomForestClassifier)
            }
            "gbclassifier" | "gradientboostingclassifier" => {
                Ok(PredictorKind::GradientBoostingClassifier)
            }
            _ => anyhow::bail!(
                "Invalid predictor: {}. Must be one of Ridge, RandomForest, GradientBoosting, Logistic, RFClassifier, GBClassifier",
                s
            ),
        }
    }
}

/// Ordered name -> factory mapping. Declaration order breaks metric ties.
#[derive(Clone, Default)]
pub struct PredictorRegistry {
    entries: Vec<(String, PredictorFactory)>,
}

impl PredictorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_kinds(kinds: &[PredictorKind], params: &ModelParams, seed: u64) -> Self {
        let mut registry = Self::new();
        for kind in kinds {
            registry.register(kind.name(), kind.factory(params, seed));
        }
        registry
    }

    /// Adds a factory. Re-registering a name replaces its factory in place.
    pub fn register(&mut self, name: impl Into<String>, factory: PredictorFactory) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&PredictorFactory> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PredictorFactory)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Predictor>> {
        self.get(name).map(|factory| factory())
    }
}

impl fmt::Debug for PredictorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictorRegistry")
            .field("entries", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!(
            PredictorKind::from_str("randomforest").unwrap(),
            PredictorKind::RandomForest
        );
        assert_eq!(
            PredictorKind::from_str(" RFClassifier ").unwrap(),
            PredictorKind::RandomForestClassifier
        );
        assert!(PredictorKind::from_str("xgboost").is_err());
    }

    #[test]
    fn test_classifier_partition() {
        assert!(PredictorKind::REGRESSORS.iter().all(|k| !k.is_classifier()));
        assert!(PredictorKind::CLASSIFIERS.iter().all(|k| k.is_classifier()));
    }

    #[test]
    fn test_registry_preserves_order() {
        let params = ModelParams::default();
        let registry = PredictorRegistry::from_kinds(
            &[PredictorKind::RandomForest, PredictorKind::Ridge],
            &params,
            42,
        );
        assert_eq!(registry.names(), vec!["RandomForest", "Ridge"]);
        assert_eq!(registry.create("Ridge").unwrap().name(), "Ridge");
        assert!(registry.create("Logistic").is_none());
    }

    #[test]
    fn test_register_replaces_in_place() {
        let params = ModelParams::default();
        let mut registry = PredictorRegistry::from_kinds(
            &[PredictorKind::Ridge, PredictorKind::RandomForest],
            &params,
            1,
        );
        registry.register("Ridge", PredictorKind::Ridge.factory(&params, 2));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Ridge", "RandomForest"]);
    }
}
