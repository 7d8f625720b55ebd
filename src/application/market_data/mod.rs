// Market data processing modules
pub mod feature_builder;
pub mod series_normalizer;
