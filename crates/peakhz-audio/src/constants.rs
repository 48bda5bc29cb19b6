//! Capture pipeline constants. Fixed by design, not runtime-configurable.

/// Sample rate for all capture and analysis (Hz).
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// Samples per analysis block.
/// At 44.1 kHz, 1024 samples is ~23ms of audio.
pub const BLOCK_SIZE_SAMPLES: usize = 1024;

/// Mono capture.
pub const CHANNELS_MONO: u16 = 1;

/// Delay between polling ticks, measured from the end of the previous
/// tick's publish rather than on a fixed-rate clock.
pub const TICK_INTERVAL_MS: u64 = 100;
