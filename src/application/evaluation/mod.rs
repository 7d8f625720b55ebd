pub mod harness;
pub mod strategy_simulator;
pub mod threshold_optimizer;

pub use harness::{
    ClassificationEvaluation, ClassifierHoldout, EvaluationHarness, PredictorFailure,
    RegressionEvaluation, RegressionHoldout,
};
pub use strategy_simulator::{StrategyComparison, StrategySimulator};
pub use threshold_optimizer::{ThresholdOptimizer, ThresholdSelection};
