/// A dominant-frequency estimate in integer Hz.
pub type FrequencyEstimate = i32;

/// Sentinel estimate: no estimate has been published yet, or capture
/// authorization was denied.
pub const NO_ESTIMATE: FrequencyEstimate = -1;
