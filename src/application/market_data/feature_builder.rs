//! Leakage-free feature and label construction.
//!
//! Every column is computed causally over the whole series first; rows are
//! only dropped afterwards, so the retained set is the intersection of all
//! valid lookback windows. The final price never gets a row because it has no
//! following day to label it.

use crate::domain::errors::PipelineError;
use crate::domain::market::PriceSeries;
use crate::domain::ml::feature_registry::{
    BOLLINGER_PERIOD, BOLLINGER_WIDTH, FEATURE_NAMES, MACD_FAST, MACD_SIGNAL, MACD_SLOW,
    RETURN_LAGS, RETURN_WINDOWS, RSI_PERIOD, SMA_WINDOWS,
};
use crate::domain::ml::{FeatureRow, LabelPair, Sample, SampleMatrix};
use crate::domain::performance::stats::Stats;
use chrono::Datelike;
use std::f64::consts::PI;
use ta::Next;
use ta::indicators::{MovingAverageConvergenceDivergence, SimpleMovingAverage};
use tracing::debug;

/// Guard added to the average loss so a loss-free window does not divide by zero.
const RSI_EPSILON: f64 = 1e-12;

/// A feature column over the whole series. `None` marks insufficient history.
type Column = Vec<Option<f64>>;

pub struct FeatureLabelBuilder;

impl FeatureLabelBuilder {
    /// Build the sample matrix for a series.
    ///
    /// Series shorter than the longest lookback produce an empty matrix, not an error.
    pub fn build(series: &PriceSeries) -> Result<SampleMatrix, PipelineError> {
        let columns = Self::feature_columns(series)?;
        debug_assert!(
            columns
                .iter()
                .map(|(name, _)| name.as_str())
                .eq(FEATURE_NAMES.iter().copied()),
            "feature columns out of sync with FEATURE_NAMES"
        );

        let prices = series.prices();
        let log_returns = log_returns(&prices);
        let points = series.points();

        let mut samples = Vec::new();
        for i in 0..points.len() {
            let Some(next_log_return) = log_returns.get(i + 1).copied().flatten() else {
                continue;
            };
            let values: Option<Vec<f64>> = columns.iter().map(|(_, col)| col[i]).collect();
            let Some(values) = values else {
                continue;
            };
            samples.push(Sample {
                features: FeatureRow {
                    date: points[i].date,
                    values,
                },
                label: LabelPair::from_next_log_return(next_log_return),
            });
        }

        debug!(
            "FeatureLabelBuilder: {} prices -> {} labeled rows ({} dropped for lookback/label)",
            points.len(),
            samples.len(),
            points.len() - samples.len()
        );

        Ok(SampleMatrix::new(samples))
    }

    /// All feature columns in registry order.
    fn feature_columns(series: &PriceSeries) -> Result<Vec<(String, Column)>, PipelineError> {
        let prices = series.prices();
        let price_col: Column = prices.iter().copied().map(Some).collect();
        let log_ret = log_returns(&prices);

        let mut columns: Vec<(String, Column)> = Vec::with_capacity(FEATURE_NAMES.len());
        columns.push(("close".to_string(), price_col));
        columns.push(("ret".to_string(), simple_returns(&prices)));
        columns.push(("logret".to_string(), log_ret.clone()));

        for lag in RETURN_LAGS {
            columns.push((format!("logret_lag{}", lag), shift(&log_ret, lag)));
        }

        for window in RETURN_WINDOWS {
            columns.push((format!("roll_mean_{}", window), rolling(&log_ret, window, mean)));
            columns.push((
                format!("roll_std_{}", window),
                rolling(&log_ret, window, sample_std),
            ));
        }

        let mut sma_20 = None;
        for window in SMA_WINDOWS {
            let sma = simple_moving_average(&prices, window)?;
            let ratio: Column = sma
                .iter()
                .zip(prices.iter())
                .map(|(ma, p)| ma.map(|ma| p / ma - 1.0))
                .collect();
            if window == BOLLINGER_PERIOD {
                sma_20 = Some(sma.clone());
            }
            columns.push((format!("sma_{}", window), sma));
            columns.push((format!("prc_sma_{}", window), ratio));
        }

        let middle = match sma_20 {
            Some(col) => col,
            None => simple_moving_average(&prices, BOLLINGER_PERIOD)?,
        };
        columns.push((
            format!("pct_b_{}", BOLLINGER_PERIOD),
            bollinger_pct_b(&prices, &middle),
        ));
        columns.push((format!("rsi_{}", RSI_PERIOD), rsi(&prices)));

        let (macd, signal, hist) = macd(&prices)?;
        columns.push(("macd".to_string(), macd));
        columns.push(("macd_signal".to_string(), signal));
        columns.push(("macd_hist".to_string(), hist));

        let dow: Vec<f64> = series
            .points()
            .iter()
            .map(|p| p.date.weekday().num_days_from_monday() as f64)
            .collect();
        let month: Vec<f64> = series.points().iter().map(|p| p.date.month() as f64).collect();
        columns.push(("dow".to_string(), dow.iter().copied().map(Some).collect()));
        columns.push(("month".to_string(), month.iter().copied().map(Some).collect()));
        columns.push((
            "dow_sin".to_string(),
            dow.iter().map(|d| Some((2.0 * PI * d / 5.0).sin())).collect(),
        ));
        columns.push((
            "dow_cos".to_string(),
            dow.iter().map(|d| Some((2.0 * PI * d / 5.0).cos())).collect(),
        ));
        columns.push((
            "m_sin".to_string(),
            month.iter().map(|m| Some((2.0 * PI * m / 12.0).sin())).collect(),
        ));
        columns.push((
            "m_cos".to_string(),
            month.iter().map(|m| Some((2.0 * PI * m / 12.0).cos())).collect(),
        ));

        Ok(columns)
    }
}

fn log_returns(prices: &[f64]) -> Column {
    (0..prices.len())
        .map(|i| (i > 0).then(|| prices[i].ln() - prices[i - 1].ln()))
        .collect()
}

fn simple_returns(prices: &[f64]) -> Column {
    (0..prices.len())
        .map(|i| (i > 0).then(|| prices[i] / prices[i - 1] - 1.0))
        .collect()
}

/// Value from `lag` rows earlier.
fn shift(col: &Column, lag: usize) -> Column {
    (0..col.len())
        .map(|i| if i >= lag { col[i - lag] } else { None })
        .collect()
}

/// Trailing window statistic over `window` values ending at each row.
fn rolling(col: &Column, window: usize, stat: fn(&[f64]) -> f64) -> Column {
    let mut out = Vec::with_capacity(col.len());
    for i in 0..col.len() {
        if i + 1 < window {
            out.push(None);
            continue;
        }
        let values: Option<Vec<f64>> = col[i + 1 - window..=i].iter().copied().collect();
        out.push(values.map(|v| stat(&v)));
    }
    out
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1).
fn sample_std(values: &[f64]) -> f64 {
    Stats::mean_std(values).map_or(f64::NAN, |(_, sd)| sd)
}

fn simple_moving_average(prices: &[f64], window: usize) -> Result<Column, PipelineError> {
    let mut sma = SimpleMovingAverage::new(window).map_err(|e| {
        PipelineError::configuration(format!("invalid SMA window {}: {:?}", window, e))
    })?;
    Ok(prices
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let value = sma.next(p);
            (i + 1 >= window).then_some(value)
        })
        .collect())
}

/// %B = (price - lower) / (upper - lower), bands = middle ± 2·std (sample std).
/// A zero-width band puts the price on the middle band (0.5).
fn bollinger_pct_b(prices: &[f64], middle: &Column) -> Column {
    let price_col: Column = prices.iter().copied().map(Some).collect();
    let std = rolling(&price_col, BOLLINGER_PERIOD, sample_std);
    prices
        .iter()
        .zip(middle.iter().zip(std.iter()))
        .map(|(&p, (mid, sd))| {
            let (mid, sd) = ((*mid)?, (*sd)?);
            let upper = mid + BOLLINGER_WIDTH * sd;
            let lower = mid - BOLLINGER_WIDTH * sd;
            let width = upper - lower;
            Some(if width > 0.0 { (p - lower) / width } else { 0.5 })
        })
        .collect()
}

/// RSI from the average gain and average loss over the last `RSI_PERIOD` price changes.
fn rsi(prices: &[f64]) -> Column {
    let deltas: Column = (0..prices.len())
        .map(|i| (i > 0).then(|| prices[i] - prices[i - 1]))
        .collect();
    let gains: Column = deltas.iter().map(|d| d.map(|d| d.max(0.0))).collect();
    let losses: Column = deltas.iter().map(|d| d.map(|d| (-d).max(0.0))).collect();
    let avg_gain = rolling(&gains, RSI_PERIOD, mean);
    let avg_loss = rolling(&losses, RSI_PERIOD, mean);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(g, l)| {
            let (g, l) = ((*g)?, (*l)?);
            let rs = g / (l + RSI_EPSILON);
            Some(100.0 - 100.0 / (1.0 + rs))
        })
        .collect()
}

/// MACD line, signal and histogram. EMAs are seeded with the first value,
/// so every row is defined.
fn macd(prices: &[f64]) -> Result<(Column, Column, Column), PipelineError> {
    let mut indicator = MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL)
        .map_err(|e| PipelineError::configuration(format!("invalid MACD periods: {:?}", e)))?;

    let mut line = Vec::with_capacity(prices.len());
    let mut signal = Vec::with_capacity(prices.len());
    let mut hist = Vec::with_capacity(prices.len());
    for &p in prices {
        let out = indicator.next(p);
        line.push(Some(out.macd));
        signal.push(Some(out.signal));
        hist.push(Some(out.histogram));
    }
    Ok((line, signal, hist))
}
