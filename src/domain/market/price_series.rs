use crate::domain::errors::PipelineError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Business-day indexed closing prices for a single symbol.
///
/// Invariants enforced at construction:
/// - every date is a weekday
/// - each date is the business day directly following the previous one (no gaps)
/// - every price is finite and strictly positive
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, PipelineError> {
        for (i, point) in points.iter().enumerate() {
            if !is_business_day(point.date) {
                return Err(PipelineError::data_format(format!(
                    "{} is not a business day",
                    point.date
                )));
            }
            if !point.price.is_finite() || point.price <= 0.0 {
                return Err(PipelineError::data_format(format!(
                    "non-positive or non-finite price {} on {}",
                    point.price, point.date
                )));
            }
            if i > 0 {
                let expected = next_business_day(points[i - 1].date);
                if point.date != expected {
                    return Err(PipelineError::data_format(format!(
                        "gap or disorder in series: expected {} after {}, got {}",
                        expected,
                        points[i - 1].date,
                        point.date
                    )));
                }
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            points,
        })
    }

    /// Lays `closes` out on consecutive business days starting at `start`
    /// (rolled forward to a weekday if needed).
    pub fn from_closes(
        symbol: impl Into<String>,
        start: NaiveDate,
        closes: &[f64],
    ) -> Result<Self, PipelineError> {
        let mut date = if is_business_day(start) {
            start
        } else {
            next_business_day(start)
        };
        let mut points = Vec::with_capacity(closes.len());
        for &price in closes {
            points.push(PricePoint { date, price });
            date = next_business_day(date);
        }
        Self::new(symbol, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let step = match date.weekday() {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    };
    date + Duration::days(step)
}

/// Business day a calendar date belongs to: weekends fold into the preceding Friday.
pub fn business_day_floor(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}
