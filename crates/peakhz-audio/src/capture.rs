use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize,
};
use parking_lot::Mutex;

use peakhz_foundation::CaptureError;

use crate::block::PcmBlock;
use crate::constants::{BLOCK_SIZE_SAMPLES, CHANNELS_MONO, SAMPLE_RATE_HZ};
use crate::device::DeviceManager;
use crate::reader::{BlockReader, StreamStatus};
use crate::ring_buffer::{AudioProducer, AudioRingBuffer};
use crate::stats::CaptureStats;
use crate::PcmSource;

/// Ring buffer capacity in blocks. Generous so a slow tick never causes
/// the callback to drop samples under normal load.
const RING_CAPACITY_BLOCKS: usize = 16;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capture device name; `None` selects the host default input.
    pub device: Option<String>,
    pub sample_rate_hz: u32,
    pub block_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate_hz: SAMPLE_RATE_HZ,
            block_size: BLOCK_SIZE_SAMPLES,
        }
    }
}

/// An open capture stream plus the reader that assembles PCM blocks from
/// it. Built and dropped on the thread that reads from it (cpal streams
/// are not `Send`); at most one session is open at a time, enforced by
/// the polling loop that owns it.
pub struct CaptureSession {
    stream: Option<Stream>,
    reader: BlockReader,
    status: Arc<StreamStatus>,
    stats: Arc<CaptureStats>,
}

impl CaptureSession {
    /// Open the capture device and start the input stream.
    pub fn open(config: &SessionConfig) -> Result<Self, CaptureError> {
        Self::open_with_cancel(config, Arc::new(AtomicBool::new(false)))
    }

    /// As `open`, with an external cancel flag that unblocks a pending
    /// `read_block` when set. The polling loop passes its shutdown flag
    /// here so `stop()` never waits on a stalled device.
    pub fn open_with_cancel(
        config: &SessionConfig,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, CaptureError> {
        let manager = DeviceManager::new();
        let device = manager.open_device(config.device.as_deref())?;

        let (stream_config, sample_format) =
            negotiate_config(&device, config.sample_rate_hz, config.block_size)?;

        let status = Arc::new(StreamStatus::default());
        let stats = Arc::new(CaptureStats::default());
        let ring = AudioRingBuffer::new(config.block_size * RING_CAPACITY_BLOCKS);
        let (producer, consumer) = ring.split();

        let stream = build_stream(
            &device,
            &stream_config,
            sample_format,
            producer,
            status.clone(),
            stats.clone(),
        )?;
        stream.play()?;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = stream_config.sample_rate.0,
            channels = stream_config.channels,
            ?sample_format,
            "capture session opened"
        );

        let reader = BlockReader::new(
            consumer,
            config.block_size,
            status.clone(),
            cancel,
            stats.clone(),
        );

        Ok(Self {
            stream: Some(stream),
            reader,
            status,
            stats,
        })
    }

}

impl PcmSource for CaptureSession {
    fn read_block(&mut self) -> Result<PcmBlock, CaptureError> {
        self.reader.read_block()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.status.closed.store(true, Ordering::SeqCst);
            drop(stream);
            tracing::info!(
                blocks_read = self.stats.blocks_read.load(Ordering::Relaxed),
                truncated_reads = self.stats.truncated_reads.load(Ordering::Relaxed),
                samples_dropped = self.stats.samples_dropped.load(Ordering::Relaxed),
                callbacks = self.stats.callbacks.load(Ordering::Relaxed),
                "capture session closed"
            );
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pick an input config at the requested rate, preferring mono. The
/// device's minimum buffer size is honored for stream construction (the
/// true capture buffer is `max(minimum, block_size)`) but the logical
/// block handed to callers stays `block_size` samples; the two are
/// deliberately decoupled.
fn negotiate_config(
    device: &Device,
    sample_rate_hz: u32,
    block_size: usize,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    let ranges = device.supported_input_configs()?;

    let mut best: Option<cpal::SupportedStreamConfigRange> = None;
    for range in ranges {
        if range.min_sample_rate().0 > sample_rate_hz
            || range.max_sample_rate().0 < sample_rate_hz
        {
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => {
                range.channels() == CHANNELS_MONO && current.channels() != CHANNELS_MONO
            }
        };
        if better {
            best = Some(range);
        }
    }

    let range = best.ok_or(CaptureError::FormatNotSupported {
        format: format!("no input config supports {} Hz", sample_rate_hz),
    })?;

    let buffer_size = match range.buffer_size() {
        SupportedBufferSize::Range { min, .. } => {
            BufferSize::Fixed((*min).max(block_size as u32))
        }
        SupportedBufferSize::Unknown => BufferSize::Default,
    };

    let sample_format = range.sample_format();
    Ok((
        StreamConfig {
            channels: range.channels(),
            sample_rate: SampleRate(sample_rate_hz),
            buffer_size,
        },
        sample_format,
    ))
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    producer: AudioProducer,
    status: Arc<StreamStatus>,
    stats: Arc<CaptureStats>,
) -> Result<Stream, CaptureError> {
    let channels = config.channels as usize;

    let err_fn = {
        let status = status.clone();
        move |err: cpal::StreamError| {
            tracing::error!("audio stream error: {}", err);
            status.failed.store(true, Ordering::SeqCst);
        }
    };

    // Interior mutability so the same handler can be moved into whichever
    // format-specific callback the device requires.
    let producer = Arc::new(Mutex::new(producer));
    let handle_i16 = {
        let stats = stats.clone();
        move |data: &[i16]| {
            stats.callbacks.fetch_add(1, Ordering::Relaxed);
            let mono;
            let samples = if channels <= 1 {
                data
            } else {
                mono = downmix_to_mono(data, channels);
                &mono[..]
            };
            let written = producer.lock().write(samples);
            if written < samples.len() {
                stats
                    .samples_dropped
                    .fetch_add((samples.len() - written) as u64, Ordering::Relaxed);
            }
        }
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                handle_i16(data);
            },
            err_fn,
            None,
        )?,
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                handle_i16(&converted);
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data.iter().map(|&s| u16_to_i16(s)).collect();
                handle_i16(&converted);
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(CaptureError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    Ok(stream)
}

/// Clamp [-1.0, 1.0] and scale to the i16 range.
fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Shift unsigned [0, 65535] to signed [-32768, 32767].
fn u16_to_i16(sample: u16) -> i16 {
    (sample as i32 - 32768) as i16
}

/// Average interleaved channels down to mono.
fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_conversion_spans_the_i16_range() {
        let src = [-1.0f32, -0.5, 0.0, 0.5, 1.0];
        let out: Vec<i16> = src.iter().map(|&s| f32_to_i16(s)).collect();
        assert_eq!(out, vec![-32767, -16384, 0, 16384, 32767]);
    }

    #[test]
    fn f32_conversion_clamps_out_of_range_input() {
        assert_eq!(f32_to_i16(2.5), 32767);
        assert_eq!(f32_to_i16(-2.5), -32767);
    }

    #[test]
    fn u16_conversion_centers_on_zero() {
        let src = [0u16, 32768, 65535];
        let out: Vec<i16> = src.iter().map(|&s| u16_to_i16(s)).collect();
        assert_eq!(out, vec![-32768, 0, 32767]);
    }

    #[test]
    fn stereo_downmix_averages_pairs() {
        let samples = [1000i16, -1000, 900, -900, 800, -800];
        assert_eq!(downmix_to_mono(&samples, 2), vec![0, 0, 0]);

        let samples = [100i16, 300, 200, 400];
        assert_eq!(downmix_to_mono(&samples, 2), vec![200, 300]);
    }
}
