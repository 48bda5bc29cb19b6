use std::sync::atomic::AtomicU64;

/// Counters shared between the capture callback, the block reader, and
/// the polling loop. All relaxed; read for diagnostics only.
#[derive(Debug, Default)]
pub struct CaptureStats {
    /// Full blocks handed to the estimator.
    pub blocks_read: AtomicU64,
    /// Reads that ended early with a zero-padded tail.
    pub truncated_reads: AtomicU64,
    /// Samples dropped because the ring buffer was full.
    pub samples_dropped: AtomicU64,
    /// Stream callback invocations.
    pub callbacks: AtomicU64,
}
