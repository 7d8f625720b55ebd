pub mod equity_curve;
pub mod metrics;
pub mod stats;
