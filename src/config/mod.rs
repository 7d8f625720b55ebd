//! Run configuration.
//!
//! Resolved in layers: built-in defaults, then an optional TOML file, then
//! environment variables, then command-line flags (applied by the binary).
//! `RunConfig::validate` must pass before a run starts.

mod model_params;

pub use model_params::ModelParams;

use crate::application::ml::PredictorKind;
use crate::domain::errors::PipelineError;
use crate::domain::performance::metrics::RegressionObjective;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

pub const MIN_HOLDOUT_DAYS: usize = 60;
pub const MAX_HOLDOUT_DAYS: usize = 504;
pub const MIN_CV_SPLITS: usize = 2;
pub const MAX_CV_SPLITS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Requested holdout size in business days.
    pub holdout_days: usize,
    pub cv_splits: usize,
    pub random_seed: u64,
    pub regression_models: Vec<PredictorKind>,
    pub classifier_models: Vec<PredictorKind>,
    pub objective: RegressionObjective,
    pub use_classifier: bool,
    pub tune_threshold: bool,
    pub model_params: ModelParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            holdout_days: 252,
            cv_splits: 5,
            random_seed: 42,
            regression_models: vec![PredictorKind::Ridge, PredictorKind::RandomForest],
            classifier_models: PredictorKind::CLASSIFIERS.to_vec(),
            objective: RegressionObjective::Rmse,
            use_classifier: true,
            tune_threshold: true,
            model_params: ModelParams::default(),
        }
    }
}

impl RunConfig {
    /// Defaults overlaid with the fields present in a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    /// Overlay process environment variables.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup. Unset keys keep the current value.
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOLDOUT_DAYS") {
            self.holdout_days = v
                .trim()
                .parse()
                .context("Failed to parse HOLDOUT_DAYS - must be an integer")?;
        }
        if let Some(v) = lookup("CV_SPLITS") {
            self.cv_splits = v
                .trim()
                .parse()
                .context("Failed to parse CV_SPLITS - must be an integer")?;
        }
        if let Some(v) = lookup("RANDOM_SEED") {
            self.random_seed = v
                .trim()
                .parse()
                .context("Failed to parse RANDOM_SEED - must be an unsigned integer")?;
        }
        if let Some(v) = lookup("REGRESSION_MODELS") {
            self.regression_models =
                parse_kinds(&v).context("Failed to parse REGRESSION_MODELS")?;
        }
        if let Some(v) = lookup("CLASSIFIER_MODELS") {
            self.classifier_models =
                parse_kinds(&v).context("Failed to parse CLASSIFIER_MODELS")?;
        }
        if let Some(v) = lookup("OPTIMIZE_METRIC") {
            self.objective =
                RegressionObjective::from_str(&v).context("Failed to parse OPTIMIZE_METRIC")?;
        }
        if let Some(v) = lookup("USE_CLASSIFIER") {
            self.use_classifier = parse_bool(&v).context("Failed to parse USE_CLASSIFIER")?;
        }
        if let Some(v) = lookup("TUNE_THRESHOLD") {
            self.tune_threshold = parse_bool(&v).context("Failed to parse TUNE_THRESHOLD")?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut problems = self.run_option_problems();
        problems.extend(self.selection_problems());
        into_result(problems)
    }

    /// Checks everything except the predictor selections. Used when callers
    /// supply their own predictor registries.
    pub fn validate_run_options(&self) -> Result<(), PipelineError> {
        into_result(self.run_option_problems())
    }

    fn run_option_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(MIN_HOLDOUT_DAYS..=MAX_HOLDOUT_DAYS).contains(&self.holdout_days) {
            problems.push(format!(
                "holdout_days must be in [{}, {}], got {}",
                MIN_HOLDOUT_DAYS, MAX_HOLDOUT_DAYS, self.holdout_days
            ));
        }
        if !(MIN_CV_SPLITS..=MAX_CV_SPLITS).contains(&self.cv_splits) {
            problems.push(format!(
                "cv_splits must be in [{}, {}], got {}",
                MIN_CV_SPLITS, MAX_CV_SPLITS, self.cv_splits
            ));
        }
        problems.extend(self.model_params.problems());
        problems
    }

    fn selection_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.regression_models.is_empty() {
            problems.push("no regression predictors selected".to_string());
        }
        if let Some(kind) = self.regression_models.iter().find(|k| k.is_classifier()) {
            problems.push(format!("{} is not a regression predictor", kind));
        }
        if self.use_classifier {
            if self.classifier_models.is_empty() {
                problems.push("classifier track enabled but no classifiers selected".to_string());
            }
            if let Some(kind) = self.classifier_models.iter().find(|k| !k.is_classifier()) {
                problems.push(format!("{} is not a classifier", kind));
            }
        }
        problems
    }
}

fn into_result(problems: Vec<String>) -> Result<(), PipelineError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::configuration(problems.join("; ")))
    }
}

fn parse_kinds(value: &str) -> Result<Vec<PredictorKind>> {
    value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(PredictorKind::from_str)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean: {}. Must be 'true' or 'false'", other),
    }
}
