/// Shared statistics utilities for return series.
pub struct Stats;

impl Stats {
    /// Convert log returns to simple returns (`expm1`).
    pub fn simple_returns(log_returns: &[f64]) -> Vec<f64> {
        log_returns.iter().map(|r| r.exp_m1()).collect()
    }

    /// Compound periodic returns from a base of 1.0.
    /// Element i is the multiplier after applying returns 0..=i.
    pub fn compound(returns: &[f64]) -> Vec<f64> {
        let mut equity = 1.0;
        returns
            .iter()
            .map(|r| {
                equity *= 1.0 + r;
                equity
            })
            .collect()
    }

    /// Largest peak-to-trough decline of an equity curve, in percent.
    /// The implicit starting equity of 1.0 counts as the first peak.
    pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
        let mut peak = 1.0_f64;
        let mut max_dd = 0.0_f64;
        for &value in equity {
            if value > peak {
                peak = value;
            } else if peak > 0.0 {
                max_dd = max_dd.max((peak - value) / peak);
            }
        }
        max_dd * 100.0
    }

    /// Sample mean and standard deviation (n-1). None when fewer than two values.
    pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
        if values.len() < 2 {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some((mean, variance.sqrt()))
    }
}
