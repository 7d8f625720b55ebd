// Series normalization and feature construction
pub mod market_data;

// Predictor implementations and registry
pub mod ml;

// Cross-validation, threshold tuning, strategy simulation
pub mod evaluation;

// Run orchestration
pub mod pipeline;
pub mod reporting;

pub use pipeline::{PredictionPipeline, RunResult};
