/// How a block read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The full block was filled from the stream.
    Complete,
    /// The stream ended (closed, failed, or cancelled) after `read`
    /// samples; the rest of the block is zero-filled.
    Truncated { read: usize },
}

/// A fixed-length block of mono signed 16-bit PCM samples.
///
/// The length is always exactly the configured block size. A truncated
/// read keeps the block at full length with a zeroed tail, the same shape
/// a short read leaves in a pre-zeroed capture array, so the estimator
/// never sees a malformed input.
#[derive(Debug, Clone)]
pub struct PcmBlock {
    samples: Vec<i16>,
    status: ReadStatus,
}

impl PcmBlock {
    pub fn complete(samples: Vec<i16>) -> Self {
        Self {
            samples,
            status: ReadStatus::Complete,
        }
    }

    /// Build a best-effort block from a short read. `samples` holds the
    /// `read` valid samples (it may already be padded to `expected`); the
    /// tail up to `expected` is zero-filled.
    pub fn truncated(mut samples: Vec<i16>, expected: usize, read: usize) -> Self {
        samples.resize(expected, 0);
        Self {
            samples,
            status: ReadStatus::Truncated { read },
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn status(&self) -> ReadStatus {
        self.status
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.status, ReadStatus::Truncated { .. })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_block_keeps_samples() {
        let block = PcmBlock::complete(vec![1, 2, 3]);
        assert_eq!(block.samples(), &[1, 2, 3]);
        assert_eq!(block.status(), ReadStatus::Complete);
        assert!(!block.is_truncated());
    }

    #[test]
    fn truncated_block_zero_fills_to_expected_length() {
        let block = PcmBlock::truncated(vec![5, 5, 5], 8, 3);
        assert_eq!(block.len(), 8);
        assert_eq!(block.samples(), &[5, 5, 5, 0, 0, 0, 0, 0]);
        assert_eq!(block.status(), ReadStatus::Truncated { read: 3 });
    }

    #[test]
    fn truncated_block_accepts_prepadded_buffer() {
        let block = PcmBlock::truncated(vec![7, 0, 0, 0], 4, 1);
        assert_eq!(block.len(), 4);
        assert_eq!(block.status(), ReadStatus::Truncated { read: 1 });
    }
}
