use crate::domain::performance::stats::Stats;
use chrono::NaiveDate;
use serde::Serialize;

/// Cumulative return multipliers aligned to holdout dates.
///
/// Value i is the equity after day i's return, compounding from a base of 1.0.
/// Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityCurve {
    name: String,
    dates: Vec<NaiveDate>,
    multipliers: Vec<f64>,
    days_in_market: usize,
}

impl EquityCurve {
    pub(crate) fn new(
        name: impl Into<String>,
        dates: Vec<NaiveDate>,
        multipliers: Vec<f64>,
        days_in_market: usize,
    ) -> Self {
        debug_assert_eq!(dates.len(), multipliers.len());
        Self {
            name: name.into(),
            dates,
            multipliers,
            days_in_market,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }

    /// Final equity multiplier (1.0 for an empty curve).
    pub fn final_multiplier(&self) -> f64 {
        self.multipliers.last().copied().unwrap_or(1.0)
    }

    pub fn total_return_pct(&self) -> f64 {
        (self.final_multiplier() - 1.0) * 100.0
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        Stats::max_drawdown_pct(&self.multipliers)
    }

    /// Share of days with a position, in percent.
    pub fn exposure_pct(&self) -> f64 {
        if self.multipliers.is_empty() {
            0.0
        } else {
            self.days_in_market as f64 / self.multipliers.len() as f64 * 100.0
        }
    }
}
