// CSV ingestion and memoization
pub mod csv_loader;
pub mod series_cache;

// Artifact output
pub mod export;

pub use csv_loader::{LoadedSeries, MarketCsvLoader};
pub use export::ArtifactExporter;
pub use series_cache::SeriesCache;
