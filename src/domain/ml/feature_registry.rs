/// Ordered list of feature names.
/// The feature builder emits columns in exactly this order and predictors
/// consume the vectors positionally. Any change here changes every model input.
pub const FEATURE_NAMES: &[&str] = &[
    "close",
    "ret",
    "logret",
    "logret_lag1",
    "logret_lag2",
    "logret_lag3",
    "logret_lag5",
    "logret_lag10",
    "logret_lag20",
    "roll_mean_5",
    "roll_std_5",
    "roll_mean_10",
    "roll_std_10",
    "roll_mean_20",
    "roll_std_20",
    "roll_mean_50",
    "roll_std_50",
    "sma_5",
    "prc_sma_5",
    "sma_10",
    "prc_sma_10",
    "sma_20",
    "prc_sma_20",
    "sma_50",
    "prc_sma_50",
    "sma_100",
    "prc_sma_100",
    "sma_200",
    "prc_sma_200",
    "pct_b_20",
    "rsi_14",
    "macd",
    "macd_signal",
    "macd_hist",
    "dow",
    "month",
    "dow_sin",
    "dow_cos",
    "m_sin",
    "m_cos",
];

pub const FEATURE_COUNT: usize = 40;

pub const RETURN_LAGS: [usize; 6] = [1, 2, 3, 5, 10, 20];
pub const RETURN_WINDOWS: [usize; 4] = [5, 10, 20, 50];
pub const SMA_WINDOWS: [usize; 6] = [5, 10, 20, 50, 100, 200];
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Longest lookback of any feature, in prices. Series shorter than this yield no rows.
pub const LONGEST_LOOKBACK: usize = 200;

/// Position of a feature in the registry.
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_registry_length() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_feature_names_unique() {
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            assert_eq!(feature_index(name), Some(i), "duplicate feature {}", name);
        }
    }

    #[test]
    fn test_longest_lookback_matches_windows() {
        let longest = SMA_WINDOWS.iter().copied().max().unwrap_or(0);
        assert_eq!(longest, LONGEST_LOOKBACK);
    }
}
