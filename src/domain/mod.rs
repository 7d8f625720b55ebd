// Price series domain
pub mod market;

// Features, labels and the predictor capability
pub mod ml;

// Forecast and strategy performance measures
pub mod performance;

// Time-ordered cross-validation
pub mod validation;

// Domain-specific error types
pub mod errors;
