//! Polling loop and host surface for the dominant-frequency monitor.

pub mod recorder;

pub use recorder::{Recorder, RecorderConfig};
