use crate::domain::errors::PipelineError;
use crate::domain::market::price_series::{business_day_floor, next_business_day};
use crate::domain::market::{PricePoint, PriceSeries};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Turns irregular (date, price) observations into a gap-free business-day series.
///
/// - Weekend observations fold into the preceding Friday.
/// - Observations sharing a business day are averaged.
/// - Missing business days are linearly interpolated in calendar time.
/// - Leading/trailing gaps are filled from the nearest observation.
pub struct SeriesNormalizer;

impl SeriesNormalizer {
    pub fn normalize(
        symbol: &str,
        observations: &[(NaiveDate, f64)],
    ) -> Result<PriceSeries, PipelineError> {
        let mut bins: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        let mut rejected = 0usize;
        for &(date, price) in observations {
            if !price.is_finite() || price <= 0.0 {
                rejected += 1;
                continue;
            }
            let entry = bins.entry(business_day_floor(date)).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
        if rejected > 0 {
            warn!(
                "SeriesNormalizer: {} dropped {} non-positive or non-finite prices",
                symbol, rejected
            );
        }

        let (Some(&first), Some(&last)) = (bins.keys().next(), bins.keys().next_back()) else {
            return Err(PipelineError::data_format(format!(
                "no usable price observations for {}",
                symbol
            )));
        };

        let mut dates = Vec::new();
        let mut values: Vec<Option<f64>> = Vec::new();
        let mut date = first;
        while date <= last {
            dates.push(date);
            values.push(bins.get(&date).map(|(sum, count)| sum / *count as f64));
            date = next_business_day(date);
        }

        let missing = values.iter().filter(|v| v.is_none()).count();
        let filled = fill_gaps(&dates, &values);
        debug!(
            "SeriesNormalizer: {} -> {} business days ({} interpolated)",
            symbol,
            dates.len(),
            missing
        );

        let points = dates
            .into_iter()
            .zip(filled)
            .map(|(date, price)| PricePoint { date, price })
            .collect();
        PriceSeries::new(symbol, points)
    }
}

/// Linear interpolation weighted by calendar days, then forward/backward fill.
fn fill_gaps(dates: &[NaiveDate], values: &[Option<f64>]) -> Vec<f64> {
    let known: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_some()).collect();
    let mut out = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        if let Some(v) = value {
            out.push(*v);
            continue;
        }
        let prev = known.iter().rev().find(|&&k| k < i).copied();
        let next = known.iter().find(|&&k| k > i).copied();
        let filled = match (prev, next) {
            (Some(a), Some(b)) => {
                let (va, vb) = (values[a].unwrap_or(0.0), values[b].unwrap_or(0.0));
                let span = (dates[b] - dates[a]).num_days() as f64;
                let offset = (dates[i] - dates[a]).num_days() as f64;
                va + (vb - va) * offset / span
            }
            (Some(a), None) => values[a].unwrap_or(0.0),
            (None, Some(b)) => values[b].unwrap_or(0.0),
            (None, None) => 0.0,
        };
        out.push(filled);
    }
    out
}
