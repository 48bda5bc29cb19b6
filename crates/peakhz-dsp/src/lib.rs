//! Frequency-domain analysis for the capture pipeline.
//!
//! Depends only on the shape of its input (a fixed-length slice of i16
//! samples), never on the capture layer.

pub mod estimator;

pub use estimator::FrequencyEstimator;
