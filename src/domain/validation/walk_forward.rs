//! Expanding-window walk-forward splits.
//!
//! Samples `[0, n)` are cut into `k + 1` contiguous blocks whose sizes differ
//! by at most one. Fold `i` trains on blocks `0..=i` and validates on block
//! `i + 1`, so validation data is always strictly later than training data.
//! Indices are never shuffled.

use crate::domain::errors::PipelineError;
use serde::Serialize;
use std::ops::Range;

/// Share of samples held for validation when there are too few samples for `k` folds.
const DEGRADED_VALIDATION_FRACTION: usize = 5;

/// One (train, validation) pair. Both ranges index into the training partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub index: usize,
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

impl Fold {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn validation_len(&self) -> usize {
        self.validation.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkForwardSplit {
    n_samples: usize,
    n_splits: usize,
}

impl WalkForwardSplit {
    pub fn new(n_samples: usize, n_splits: usize) -> Result<Self, PipelineError> {
        if n_splits == 0 {
            return Err(PipelineError::configuration(
                "number of folds must be at least 1",
            ));
        }
        if n_samples < 2 {
            return Err(PipelineError::configuration(format!(
                "cannot split {} samples into train and validation",
                n_samples
            )));
        }
        Ok(Self {
            n_samples,
            n_splits,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// True when there are too few samples for `k` expanding folds and a single
    /// 80/20 fold is produced instead.
    pub fn is_degraded(&self) -> bool {
        self.n_samples < self.n_splits + 1
    }

    /// Number of folds the iterator yields.
    pub fn len(&self) -> usize {
        if self.is_degraded() { 1 } else { self.n_splits }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Fresh iterator over the folds. Can be called any number of times.
    pub fn folds(&self) -> Folds {
        Folds {
            split: *self,
            next: 0,
        }
    }

    fn block_boundary(&self, block: usize) -> usize {
        block * self.n_samples / (self.n_splits + 1)
    }

    fn fold_at(&self, i: usize) -> Option<Fold> {
        if i >= self.len() {
            return None;
        }
        if self.is_degraded() {
            let validation = (self.n_samples / DEGRADED_VALIDATION_FRACTION).max(1);
            let cut = self.n_samples - validation;
            return Some(Fold {
                index: 0,
                train: 0..cut,
                validation: cut..self.n_samples,
            });
        }
        let train_end = self.block_boundary(i + 1);
        let validation_end = self.block_boundary(i + 2);
        Some(Fold {
            index: i,
            train: 0..train_end,
            validation: train_end..validation_end,
        })
    }
}

impl<'a> IntoIterator for &'a WalkForwardSplit {
    type Item = Fold;
    type IntoIter = Folds;

    fn into_iter(self) -> Self::IntoIter {
        self.folds()
    }
}

/// Lazy fold iterator.
#[derive(Debug, Clone)]
pub struct Folds {
    split: WalkForwardSplit,
    next: usize,
}

impl Iterator for Folds {
    type Item = Fold;

    fn next(&mut self) -> Option<Fold> {
        let fold = self.split.fold_at(self.next)?;
        self.next += 1;
        Some(fold)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.split.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Folds {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_no_leakage(split: &WalkForwardSplit) {
        for fold in split {
            assert!(!fold.train.is_empty(), "empty train in fold {}", fold.index);
            assert!(
                !fold.validation.is_empty(),
                "empty validation in fold {}",
                fold.index
            );
            assert_eq!(fold.train.start, 0);
            assert!(fold.train.end <= fold.validation.start);
            assert!(fold.validation.end <= split.n_samples());
        }
    }

    #[test]
    fn test_expanding_blocks() {
        let split = WalkForwardSplit::new(12, 5).unwrap();
        let folds: Vec<Fold> = split.folds().collect();
        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0].train, 0..2);
        assert_eq!(folds[0].validation, 2..4);
        assert_eq!(folds[4].train, 0..10);
        assert_eq!(folds[4].validation, 10..12);
    }

    #[test]
    fn test_blocks_differ_by_at_most_one() {
        for n in 6..200 {
            let split = WalkForwardSplit::new(n, 5).unwrap();
            let sizes: Vec<usize> = split.folds().map(|f| f.validation_len()).collect();
            let first_block = split.folds().next().unwrap().train_len();
            let max = sizes.iter().copied().chain([first_block]).max().unwrap();
            let min = sizes.iter().copied().chain([first_block]).min().unwrap();
            assert!(max - min <= 1, "n={} sizes={:?}", n, sizes);
            assert_no_leakage(&split);
        }
    }

    #[test]
    fn test_train_size_non_decreasing_and_contiguous() {
        let split = WalkForwardSplit::new(103, 4).unwrap();
        let folds: Vec<Fold> = split.folds().collect();
        for pair in folds.windows(2) {
            assert!(pair[1].train_len() >= pair[0].train_len());
            assert_eq!(pair[1].train.end, pair[0].validation.end);
        }
        assert_eq!(folds.last().unwrap().validation.end, 103);
    }

    #[test]
    fn test_degrades_to_single_fold() {
        let split = WalkForwardSplit::new(5, 8).unwrap();
        assert!(split.is_degraded());
        let folds: Vec<Fold> = split.folds().collect();
        assert_eq!(folds.len(), 1);
        assert_eq!(folds[0].train, 0..4);
        assert_eq!(folds[0].validation, 4..5);

        let split = WalkForwardSplit::new(2, 3).unwrap();
        let fold = split.folds().next().unwrap();
        assert_eq!(fold.train, 0..1);
        assert_eq!(fold.validation, 1..2);
    }

    #[test]
    fn test_restartable() {
        let split = WalkForwardSplit::new(50, 3).unwrap();
        let first: Vec<Fold> = split.folds().collect();
        let second: Vec<Fold> = (&split).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(split.folds().len(), 3);
    }

    #[test]
    fn test_rejects_unsplittable_input() {
        assert!(WalkForwardSplit::new(1, 5).is_err());
        assert!(WalkForwardSplit::new(100, 0).is_err());
    }
}
