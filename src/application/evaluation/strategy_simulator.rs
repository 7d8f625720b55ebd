use crate::domain::errors::PipelineError;
use crate::domain::performance::equity_curve::EquityCurve;
use crate::domain::performance::metrics::{ClassificationMetrics, ConfusionMatrix};
use crate::domain::performance::stats::Stats;
use chrono::NaiveDate;
use serde::Serialize;

pub const BUY_AND_HOLD: &str = "BuyHold";

/// One row of the holdout strategy comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyComparison {
    pub strategy: String,
    pub confusion: ConfusionMatrix,
    pub metrics: ClassificationMetrics,
    pub final_multiplier: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub exposure_pct: f64,
}

/// Long-or-flat equity simulation over the holdout.
pub struct StrategySimulator;

impl StrategySimulator {
    /// Always-invested benchmark.
    pub fn buy_and_hold(
        dates: &[NaiveDate],
        log_returns: &[f64],
    ) -> Result<EquityCurve, PipelineError> {
        Self::signal_gated(BUY_AND_HOLD, dates, log_returns, &vec![1; log_returns.len()])
    }

    /// Compounds `1 + signal * r` where `r` is the simple next-day return.
    pub fn signal_gated(
        name: &str,
        dates: &[NaiveDate],
        log_returns: &[f64],
        signals: &[u8],
    ) -> Result<EquityCurve, PipelineError> {
        if signals.len() != log_returns.len() || dates.len() != log_returns.len() {
            return Err(PipelineError::data_format(format!(
                "{}: {} signals, {} returns and {} dates must align",
                name,
                signals.len(),
                log_returns.len(),
                dates.len()
            )));
        }
        let gated: Vec<f64> = Stats::simple_returns(log_returns)
            .into_iter()
            .zip(signals)
            .map(|(r, &s)| if s != 0 { r } else { 0.0 })
            .collect();
        let days_in_market = signals.iter().filter(|&&s| s != 0).count();
        Ok(EquityCurve::new(
            name,
            dates.to_vec(),
            Stats::compound(&gated),
            days_in_market,
        ))
    }

    /// Equity curve plus its comparison row against the realized directions.
    pub fn compare(
        name: &str,
        dates: &[NaiveDate],
        log_returns: &[f64],
        directions: &[u8],
        signals: &[u8],
    ) -> Result<(StrategyComparison, EquityCurve), PipelineError> {
        let curve = Self::signal_gated(name, dates, log_returns, signals)?;
        let confusion = ConfusionMatrix::from_labels(directions, signals);
        let row = StrategyComparison {
            strategy: name.to_string(),
            confusion,
            metrics: ClassificationMetrics::from_confusion(&confusion),
            final_multiplier: curve.final_multiplier(),
            total_return_pct: curve.total_return_pct(),
            max_drawdown_pct: curve.max_drawdown_pct(),
            exposure_pct: curve.exposure_pct(),
        };
        Ok((row, curve))
    }
}
