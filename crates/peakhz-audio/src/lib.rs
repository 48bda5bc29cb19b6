pub mod block;
pub mod capture;
pub mod constants;
pub mod device;
pub mod reader;
pub mod ring_buffer;
pub mod stats;

// Public API
pub use block::{PcmBlock, ReadStatus};
pub use capture::{CaptureSession, SessionConfig};
pub use constants::{BLOCK_SIZE_SAMPLES, CHANNELS_MONO, SAMPLE_RATE_HZ, TICK_INTERVAL_MS};
pub use device::DeviceManager;
pub use reader::{AuthProbe, BlockReader, StreamStatus};
pub use ring_buffer::AudioRingBuffer;
pub use stats::CaptureStats;

use peakhz_foundation::CaptureError;

/// Pull-based source of fixed-size PCM blocks.
///
/// The real implementation wraps a live capture stream and is not `Send`
/// (cpal streams are bound to the thread that built them); the polling
/// loop therefore opens its source on the tick thread itself.
pub trait PcmSource {
    /// Block until a full PCM block has accumulated, or the stream ends.
    fn read_block(&mut self) -> Result<PcmBlock, CaptureError>;

    /// Stop the stream and release the device. Idempotent.
    fn close(&mut self);
}
