use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Maps one PCM block to the frequency of its peak-magnitude DFT bin.
///
/// The block is transformed as-is: a raw cast of each sample to float,
/// no window, no normalization, no DC removal. The argmax scan covers
/// the full bin range including the mirrored upper half; for real input
/// the mirrored magnitudes are equal, so the lowest-index tie-break
/// keeps the result at or below the Nyquist frequency. An all-zero
/// block resolves to bin 0 and therefore 0 Hz.
pub struct FrequencyEstimator {
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    sample_rate_hz: u32,
    block_size: usize,
}

impl FrequencyEstimator {
    /// Plan a forward FFT for `block_size` samples. The planner handles
    /// any length via mixed radix, so non-power-of-two sizes need no
    /// padding; the production size of 1024 gets the radix-2 path.
    pub fn new(sample_rate_hz: u32, block_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(block_size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            scratch,
            sample_rate_hz,
            block_size,
        }
    }

    /// Center frequency of bin `index`, in Hz.
    pub fn bin_frequency(&self, index: usize) -> f64 {
        index as f64 * self.sample_rate_hz as f64 / self.block_size as f64
    }

    /// Width of one frequency bin, in Hz.
    pub fn bin_width(&self) -> f64 {
        self.sample_rate_hz as f64 / self.block_size as f64
    }

    /// Estimate the dominant frequency of `samples` in integer Hz.
    ///
    /// `samples` must be exactly the planned block size. Never fails on
    /// a well-formed block.
    pub fn estimate(&mut self, samples: &[i16]) -> i32 {
        debug_assert_eq!(samples.len(), self.block_size);

        let mut spectrum: Vec<Complex<f32>> = samples
            .iter()
            .map(|&s| Complex {
                re: s as f32,
                im: 0.0,
            })
            .collect();
        self.fft.process_with_scratch(&mut spectrum, &mut self.scratch);

        // Strict comparison in a left-to-right scan: ties resolve to the
        // lowest index.
        let mut peak_index = 0;
        let mut peak_magnitude = 0.0f32;
        for (i, c) in spectrum.iter().enumerate() {
            let magnitude = c.norm();
            if magnitude > peak_magnitude {
                peak_magnitude = magnitude;
                peak_index = i;
            }
        }

        self.bin_frequency(peak_index).round() as i32
    }
}
