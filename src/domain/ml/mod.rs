pub mod feature_registry;
pub mod predictor;
pub mod sample_matrix;

pub use predictor::{Predictor, PredictorFactory};
pub use sample_matrix::{FeatureRow, LabelPair, Sample, SampleMatrix};
