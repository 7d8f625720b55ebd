use crate::domain::ml::feature_registry::{FEATURE_NAMES, feature_index};
use chrono::NaiveDate;
use serde::Serialize;
use std::ops::Range;

/// Feature vector for one business day, in `FEATURE_NAMES` order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).and_then(|i| self.values.get(i).copied())
    }

    /// (name, value) pairs in registry order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Targets derived from the following business day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelPair {
    pub next_log_return: f64,
    pub next_direction: u8,
}

impl LabelPair {
    pub fn from_next_log_return(next_log_return: f64) -> Self {
        Self {
            next_log_return,
            next_direction: u8::from(next_log_return > 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub features: FeatureRow,
    pub label: LabelPair,
}

/// Date-ascending supervised learning samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleMatrix {
    samples: Vec<Sample>,
}

impl SampleMatrix {
    /// Panics in debug builds if samples are not strictly date-ascending.
    pub fn new(samples: Vec<Sample>) -> Self {
        debug_assert!(
            samples
                .windows(2)
                .all(|w| w[0].features.date < w[1].features.date),
            "samples must be strictly date-ascending"
        );
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.samples.iter().map(|s| s.features.date).collect()
    }

    pub fn features(&self, range: Range<usize>) -> Vec<Vec<f64>> {
        self.samples[range]
            .iter()
            .map(|s| s.features.values.clone())
            .collect()
    }

    pub fn all_features(&self) -> Vec<Vec<f64>> {
        self.features(0..self.len())
    }

    pub fn next_log_returns(&self, range: Range<usize>) -> Vec<f64> {
        self.samples[range]
            .iter()
            .map(|s| s.label.next_log_return)
            .collect()
    }

    pub fn next_directions(&self, range: Range<usize>) -> Vec<u8> {
        self.samples[range]
            .iter()
            .map(|s| s.label.next_direction)
            .collect()
    }

    /// Splits off the last `holdout` samples. Both halves keep date order.
    pub fn split_holdout(&self, holdout: usize) -> (SampleMatrix, SampleMatrix) {
        let cut = self.len().saturating_sub(holdout);
        (
            SampleMatrix::new(self.samples[..cut].to_vec()),
            SampleMatrix::new(self.samples[cut..].to_vec()),
        )
    }
}
