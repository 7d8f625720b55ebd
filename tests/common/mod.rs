#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use nextday::config::{ModelParams, RunConfig};
use nextday::domain::market::PriceSeries;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

/// Deterministic wavy log returns with both up and down days.
pub fn wavy_log_returns(n: usize) -> Vec<f64> {
    (0..n)
        .map(|t| {
            let t = t as f64;
            0.01 * (0.9 * t).sin() + 0.004 * (2.3 * t).cos() + 0.0005
        })
        .collect()
}

pub fn wavy_closes(n: usize) -> Vec<f64> {
    let mut price = 100.0;
    let mut closes = vec![price];
    for r in wavy_log_returns(n - 1) {
        price *= f64::exp(r);
        closes.push(price);
    }
    closes
}

pub fn wavy_series(n: usize) -> PriceSeries {
    PriceSeries::from_closes("WAVY", start_date(), &wavy_closes(n)).unwrap()
}

pub fn constant_series(n: usize) -> PriceSeries {
    PriceSeries::from_closes("FLAT", start_date(), &vec![50.0; n]).unwrap()
}

/// Small forests and few boosting rounds keep tests quick.
pub fn fast_config() -> RunConfig {
    RunConfig {
        model_params: ModelParams {
            n_trees: 10,
            boosting_rounds: 15,
            ..ModelParams::default()
        },
        ..RunConfig::default()
    }
}

/// Yahoo-style CSV with weekends skipped.
pub fn csv_text(closes: &[f64]) -> String {
    let mut out = String::from("Date,Open,Close,Adj Close\n");
    let mut date = start_date();
    for close in closes {
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date += Duration::days(1);
        }
        out.push_str(&format!("{},{:.4},{:.4},{:.6}\n", date, close, close, close));
        date += Duration::days(1);
    }
    out
}
