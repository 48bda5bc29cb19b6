use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peakhz_foundation::CaptureError;

use crate::block::PcmBlock;
use crate::device::DeviceManager;
use crate::ring_buffer::AudioConsumer;
use crate::stats::CaptureStats;

/// How often the reader polls the ring buffer while waiting for samples.
/// One block at 44.1 kHz spans ~23ms, so 5ms keeps the wait well under a
/// block period without spinning.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Authorization probe invoked at the top of every block read.
pub type AuthProbe = Box<dyn Fn() -> Result<(), CaptureError> + Send>;

/// Flags shared between the stream callback, the session, and the reader.
#[derive(Debug, Default)]
pub struct StreamStatus {
    /// The session was closed; a pending read returns its partial block.
    pub closed: AtomicBool,
    /// The backend reported a stream error.
    pub failed: AtomicBool,
}

/// Assembles fixed-size PCM blocks from the capture ring buffer.
///
/// `read_block` blocks the calling thread, looping over short reads,
/// until the block fills. When the stream closes, fails, or the session
/// is cancelled first, it returns early with whatever was read as a
/// zero-padded best-effort block instead of failing the tick.
pub struct BlockReader {
    consumer: AudioConsumer,
    block_size: usize,
    status: Arc<StreamStatus>,
    cancel: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    authorize: AuthProbe,
}

impl BlockReader {
    pub fn new(
        consumer: AudioConsumer,
        block_size: usize,
        status: Arc<StreamStatus>,
        cancel: Arc<AtomicBool>,
        stats: Arc<CaptureStats>,
    ) -> Self {
        Self::with_auth_probe(
            consumer,
            block_size,
            status,
            cancel,
            stats,
            Box::new(|| DeviceManager::new().capture_authorized()),
        )
    }

    /// Reader with a custom authorization probe; tests substitute one to
    /// exercise the permission paths without touching the host.
    pub fn with_auth_probe(
        consumer: AudioConsumer,
        block_size: usize,
        status: Arc<StreamStatus>,
        cancel: Arc<AtomicBool>,
        stats: Arc<CaptureStats>,
        authorize: AuthProbe,
    ) -> Self {
        Self {
            consumer,
            block_size,
            status,
            cancel,
            stats,
            authorize,
        }
    }

    pub fn read_block(&mut self) -> Result<PcmBlock, CaptureError> {
        // Re-validated on every read, not only at open: authorization can
        // be revoked between open and read.
        (self.authorize)()?;

        let mut buffer = vec![0i16; self.block_size];
        let mut filled = 0;

        while filled < self.block_size {
            filled += self.consumer.read(&mut buffer[filled..]);
            if filled >= self.block_size {
                break;
            }

            if self.stream_ended() {
                // Drain anything that arrived between the last read and
                // the close, then hand back the best-effort block.
                filled += self.consumer.read(&mut buffer[filled..]);
                if filled >= self.block_size {
                    break;
                }
                self.stats
                    .truncated_reads
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    read = filled,
                    expected = self.block_size,
                    "stream ended before block filled; returning truncated block"
                );
                return Ok(PcmBlock::truncated(buffer, self.block_size, filled));
            }

            std::thread::sleep(READ_POLL_INTERVAL);
        }

        self.stats.blocks_read.fetch_add(1, Ordering::Relaxed);
        Ok(PcmBlock::complete(buffer))
    }

    fn stream_ended(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
            || self.status.closed.load(Ordering::SeqCst)
            || self.status.failed.load(Ordering::SeqCst)
    }
}
