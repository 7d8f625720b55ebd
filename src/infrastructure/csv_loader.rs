//! Price history loader for Yahoo-style CSV exports.
//!
//! Accepts a `Date` column, a price column (`Adj Close` preferred over
//! `Close`), and an optional `Ticker`/`Index` column for multi-symbol files.

use crate::application::market_data::series_normalizer::SeriesNormalizer;
use crate::domain::errors::PipelineError;
use crate::domain::market::PriceSeries;
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DEFAULT_TICKER: &str = "SERIES";

/// A normalized series plus what was discarded on the way in.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub ticker: String,
    pub series: PriceSeries,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub tickers_seen: usize,
}

pub struct MarketCsvLoader;

impl MarketCsvLoader {
    pub fn load_path(path: impl AsRef<Path>) -> Result<LoadedSeries, PipelineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::data_format(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::load_bytes(&bytes)
    }

    pub fn load_bytes(bytes: &[u8]) -> Result<LoadedSeries, PipelineError> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|e| PipelineError::data_format(format!("unreadable CSV header: {}", e)))?
            .clone();
        let columns = Columns::locate(&headers)?;

        // (ticker, date) -> price; later rows overwrite earlier ones
        let mut observations: HashMap<(String, NaiveDate), f64> = HashMap::new();
        let mut rows_read = 0usize;
        let mut rows_dropped = 0usize;
        for record in reader.records() {
            let record =
                record.map_err(|e| PipelineError::data_format(format!("malformed CSV: {}", e)))?;
            rows_read += 1;
            match columns.parse(&record) {
                Some((ticker, date, price)) => {
                    observations.insert((ticker, date), price);
                }
                None => rows_dropped += 1,
            }
        }

        let mut per_ticker: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
        for ((ticker, date), price) in observations {
            per_ticker.entry(ticker).or_default().push((date, price));
        }

        // Most observations wins; BTreeMap order makes ties go to the smallest name
        let mut selected: Option<(&String, &Vec<(NaiveDate, f64)>)> = None;
        for (ticker, rows) in &per_ticker {
            if selected.is_none_or(|(_, best)| rows.len() > best.len()) {
                selected = Some((ticker, rows));
            }
        }
        let Some((ticker, rows)) = selected else {
            return Err(PipelineError::data_format(format!(
                "no usable rows ({} read, {} dropped)",
                rows_read, rows_dropped
            )));
        };

        debug!(
            "MarketCsvLoader: {} rows read, {} dropped, {} tickers",
            rows_read,
            rows_dropped,
            per_ticker.len()
        );
        let series = SeriesNormalizer::normalize(ticker, rows)?;
        info!(
            "Loaded {}: {} business days ({} to {})",
            ticker,
            series.len(),
            series.first_date().map(|d| d.to_string()).unwrap_or_default(),
            series.last_date().map(|d| d.to_string()).unwrap_or_default()
        );

        Ok(LoadedSeries {
            ticker: ticker.clone(),
            series,
            rows_read,
            rows_dropped,
            tickers_seen: per_ticker.len(),
        })
    }
}

struct Columns {
    date: usize,
    price: usize,
    ticker: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, PipelineError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        };
        let date = find(&["Date", "Datetime"])
            .ok_or_else(|| PipelineError::data_format("missing Date column"))?;
        let price = find(&["Adj Close", "Adj_Close", "AdjClose"])
            .or_else(|| find(&["Close"]))
            .ok_or_else(|| PipelineError::data_format("missing Adj Close / Close column"))?;
        let ticker = find(&["Ticker", "Index", "Symbol"]);
        Ok(Self {
            date,
            price,
            ticker,
        })
    }

    fn parse(&self, record: &StringRecord) -> Option<(String, NaiveDate, f64)> {
        let date = parse_date(record.get(self.date)?)?;
        let price: f64 = record.get(self.price)?.replace(',', "").parse().ok()?;
        if !price.is_finite() {
            return None;
        }
        let ticker = match self.ticker {
            Some(i) => record.get(i).filter(|t| !t.is_empty())?.to_string(),
            None => DEFAULT_TICKER.to_string(),
        };
        Some((ticker, date, price))
    }
}

/// Parses a date or datetime cell. Timezone suffixes after the time are ignored.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
