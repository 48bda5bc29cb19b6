use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;
use parking_lot::Mutex;

use peakhz_audio::capture::{CaptureSession, SessionConfig};
use peakhz_audio::constants::{BLOCK_SIZE_SAMPLES, SAMPLE_RATE_HZ, TICK_INTERVAL_MS};
use peakhz_audio::PcmSource;
use peakhz_dsp::FrequencyEstimator;
use peakhz_foundation::{CaptureError, FrequencyEstimate, RecorderState, StateManager, NO_ESTIMATE};

/// Builds the PCM source on the tick thread. cpal streams are not `Send`,
/// so the session must be created and dropped on the thread that reads
/// from it. The cancel flag is the recorder's shutdown flag; a set flag
/// unblocks a pending `read_block`.
pub type SourceOpener = Arc<
    dyn Fn(&RecorderConfig, Arc<AtomicBool>) -> Result<Box<dyn PcmSource>, CaptureError>
        + Send
        + Sync,
>;

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Capture device name; `None` selects the host default input.
    pub device: Option<String>,
    pub sample_rate_hz: u32,
    pub block_size: usize,
    /// Delay between ticks, measured from the end of the previous tick.
    pub tick_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate_hz: SAMPLE_RATE_HZ,
            block_size: BLOCK_SIZE_SAMPLES,
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
        }
    }
}

struct TickWorker {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

/// The polling loop: owns the capture session (through its tick thread)
/// and the published estimate.
///
/// One tick is one capture-estimate-publish cycle. Ticks run on a single
/// dedicated thread and the next tick is scheduled only after the
/// current one publishes, so two ticks can never overlap and estimates
/// publish in capture order. `start` and `stop` are safe to call from
/// any thread and never block on audio I/O.
pub struct Recorder {
    config: RecorderConfig,
    state: StateManager,
    latest: Arc<AtomicI32>,
    ticks: Arc<AtomicU64>,
    worker: Mutex<Option<TickWorker>>,
    opener: SourceOpener,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self::with_opener(
            config,
            Arc::new(|config: &RecorderConfig, cancel| {
                let session = CaptureSession::open_with_cancel(
                    &SessionConfig {
                        device: config.device.clone(),
                        sample_rate_hz: config.sample_rate_hz,
                        block_size: config.block_size,
                    },
                    cancel,
                )?;
                Ok(Box::new(session) as Box<dyn PcmSource>)
            }),
        )
    }

    /// Recorder with a custom source opener; tests substitute in-memory
    /// sources here.
    pub fn with_opener(config: RecorderConfig, opener: SourceOpener) -> Self {
        Self {
            config,
            state: StateManager::new(),
            latest: Arc::new(AtomicI32::new(NO_ESTIMATE)),
            ticks: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
            opener,
        }
    }

    /// Begin recording. The capture session is opened on the tick thread
    /// and its open result is returned synchronously; on failure the
    /// state stays `Idle` and the sentinel stays published, and a
    /// permission failure is retryable once the host obtains
    /// authorization. Calling `start` while already recording is a
    /// no-op; a second session is never opened.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            tracing::debug!("start() while already recording; ignored");
            return Ok(());
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let (open_tx, open_rx) = bounded::<Result<(), CaptureError>>(1);

        let opener = self.opener.clone();
        let config = self.config.clone();
        let latest = self.latest.clone();
        let ticks = self.ticks.clone();
        let thread_shutdown = shutdown.clone();

        let handle = thread::Builder::new()
            .name("freq-tick".to_string())
            .spawn(move || {
                let mut source = match opener(&config, thread_shutdown.clone()) {
                    Ok(source) => {
                        let _ = open_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };

                let mut estimator =
                    FrequencyEstimator::new(config.sample_rate_hz, config.block_size);
                tracing::info!("polling loop started");

                while !thread_shutdown.load(Ordering::SeqCst) {
                    let estimate = match source.read_block() {
                        Ok(block) => {
                            if block.is_truncated() {
                                tracing::debug!(
                                    status = ?block.status(),
                                    "estimating best-effort block"
                                );
                            }
                            estimator.estimate(block.samples())
                        }
                        Err(CaptureError::PermissionDenied) => {
                            tracing::warn!("capture permission revoked mid-recording");
                            NO_ESTIMATE
                        }
                        Err(e) => {
                            tracing::error!("block read failed: {}", e);
                            NO_ESTIMATE
                        }
                    };

                    // A stop() that cancelled the read above leaves a
                    // truncated block behind; skip the publish so no stale
                    // value lands after shutdown.
                    if thread_shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    latest.store(estimate, Ordering::SeqCst);
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(estimate, "tick published");

                    // Delay measured from publish completion, not a
                    // fixed-rate clock: a slow tick pushes later ticks out
                    // and overlap cannot occur.
                    thread::sleep(config.tick_interval);
                }

                source.close();
                tracing::info!("polling loop stopped");
            })
            .map_err(|e| CaptureError::DeviceUnavailable {
                reason: format!("failed to spawn tick thread: {}", e),
            })?;

        match open_rx.recv() {
            Ok(Ok(())) => {
                if let Err(e) = self.state.transition(RecorderState::Recording) {
                    tracing::error!("state transition failed: {}", e);
                }
                *worker = Some(TickWorker { handle, shutdown });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!("failed to start recording: {}", e);
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::DeviceUnavailable {
                    reason: "tick thread exited before reporting its open result".to_string(),
                })
            }
        }
    }

    /// End recording: cancel any scheduled-but-not-started tick, unblock
    /// a read in progress, close the session, return to `Idle`. No-op
    /// when already idle; safe to call repeatedly and before any
    /// successful `start`.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(TickWorker { handle, shutdown }) = worker.take() else {
            tracing::debug!("stop() while idle; ignored");
            return;
        };

        shutdown.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            tracing::error!("tick thread panicked during shutdown");
        }
        if let Err(e) = self.state.transition(RecorderState::Idle) {
            tracing::error!("state transition failed: {}", e);
        }
    }

    /// Most recent estimate in integer Hz; `NO_ESTIMATE` until the first
    /// tick publishes or while permission is denied. Last-write-wins,
    /// readable from any thread.
    pub fn latest_estimate(&self) -> FrequencyEstimate {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn current_state(&self) -> RecorderState {
        self.state.current()
    }

    /// Completed ticks since the recorder was created.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peakhz_audio::PcmBlock;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    const TEST_BLOCK: usize = 1024;

    fn sine_block(bin: usize) -> Vec<i16> {
        (0..TEST_BLOCK)
            .map(|t| {
                let phase =
                    2.0 * std::f64::consts::PI * bin as f64 * t as f64 / TEST_BLOCK as f64;
                (10_000.0 * phase.sin()).round() as i16
            })
            .collect()
    }

    fn test_config() -> RecorderConfig {
        RecorderConfig {
            device: None,
            sample_rate_hz: 44_100,
            block_size: TEST_BLOCK,
            tick_interval: Duration::from_millis(1),
        }
    }

    #[derive(Clone)]
    enum ScriptedRead {
        Block(PcmBlock),
        Denied,
    }

    /// Scripted source: yields each scripted read in order, then repeats
    /// the last one forever.
    struct FakeSource {
        script: Vec<ScriptedRead>,
        position: usize,
        closed: Arc<AtomicBool>,
    }

    impl PcmSource for FakeSource {
        fn read_block(&mut self) -> Result<PcmBlock, CaptureError> {
            let index = self.position.min(self.script.len() - 1);
            self.position += 1;
            match &self.script[index] {
                ScriptedRead::Block(block) => Ok(block.clone()),
                ScriptedRead::Denied => Err(CaptureError::PermissionDenied),
            }
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FakeOpenerState {
        opens: AtomicUsize,
        closed: Arc<AtomicBool>,
    }

    fn recorder_with_script(script: Vec<ScriptedRead>) -> (Recorder, Arc<FakeOpenerState>) {
        let shared = Arc::new(FakeOpenerState {
            opens: AtomicUsize::new(0),
            closed: Arc::new(AtomicBool::new(false)),
        });
        let opener_shared = shared.clone();
        let script = Arc::new(script);
        let recorder = Recorder::with_opener(
            test_config(),
            Arc::new(move |_config, _cancel| {
                opener_shared.opens.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeSource {
                    script: script.as_ref().clone(),
                    position: 0,
                    closed: opener_shared.closed.clone(),
                }) as Box<dyn PcmSource>)
            }),
        );
        (recorder, shared)
    }

    fn wait_for_ticks(recorder: &Recorder, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while recorder.ticks() < count {
            assert!(Instant::now() < deadline, "timed out waiting for ticks");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn publishes_estimates_from_captured_blocks() {
        let (recorder, _shared) =
            recorder_with_script(vec![ScriptedRead::Block(PcmBlock::complete(sine_block(10)))]);
        assert_eq!(recorder.latest_estimate(), NO_ESTIMATE);

        recorder.start().unwrap();
        assert_eq!(recorder.current_state(), RecorderState::Recording);
        wait_for_ticks(&recorder, 2);
        recorder.stop();

        // Bin 10 of a 1024-block at 44.1 kHz: 431 Hz.
        assert_eq!(recorder.latest_estimate(), 431);
        assert_eq!(recorder.current_state(), RecorderState::Idle);
    }

    #[test]
    fn stop_twice_is_a_noop_and_leaves_idle() {
        let (recorder, shared) = recorder_with_script(vec![ScriptedRead::Block(
            PcmBlock::complete(vec![0i16; TEST_BLOCK]),
        )]);
        recorder.start().unwrap();
        wait_for_ticks(&recorder, 1);

        recorder.stop();
        recorder.stop();
        assert_eq!(recorder.current_state(), RecorderState::Idle);
        assert!(shared.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_before_any_start_is_safe() {
        let (recorder, shared) = recorder_with_script(vec![ScriptedRead::Block(
            PcmBlock::complete(vec![0i16; TEST_BLOCK]),
        )]);
        recorder.stop();
        assert_eq!(recorder.current_state(), RecorderState::Idle);
        assert_eq!(shared.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_while_recording_opens_no_second_session() {
        let (recorder, shared) = recorder_with_script(vec![ScriptedRead::Block(
            PcmBlock::complete(vec![0i16; TEST_BLOCK]),
        )]);
        recorder.start().unwrap();
        recorder.start().unwrap();

        assert_eq!(shared.opens.load(Ordering::SeqCst), 1);
        recorder.stop();
    }

    #[test]
    fn open_failure_stays_idle_and_keeps_sentinel() {
        let recorder = Recorder::with_opener(
            test_config(),
            Arc::new(|_config, _cancel| Err(CaptureError::PermissionDenied)),
        );

        let result = recorder.start();
        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
        assert_eq!(recorder.current_state(), RecorderState::Idle);
        assert_eq!(recorder.latest_estimate(), NO_ESTIMATE);

        // Retryable: a later start must not be poisoned by the failure.
        assert!(recorder.start().is_err());
        assert_eq!(recorder.current_state(), RecorderState::Idle);
    }

    #[test]
    fn truncated_block_still_publishes_and_loop_continues() {
        let truncated = PcmBlock::truncated(sine_block(10)[..600].to_vec(), TEST_BLOCK, 600);
        let (recorder, _shared) = recorder_with_script(vec![
            ScriptedRead::Block(truncated),
            ScriptedRead::Block(PcmBlock::complete(sine_block(10))),
        ]);

        recorder.start().unwrap();
        wait_for_ticks(&recorder, 3);
        recorder.stop();

        // The loop survived the short read and kept scheduling ticks.
        assert!(recorder.ticks() >= 3);
        assert_ne!(recorder.latest_estimate(), NO_ESTIMATE);
    }

    #[test]
    fn permission_revoked_mid_recording_publishes_sentinel() {
        let (recorder, _shared) = recorder_with_script(vec![
            ScriptedRead::Block(PcmBlock::complete(sine_block(10))),
            ScriptedRead::Denied,
        ]);

        recorder.start().unwrap();
        wait_for_ticks(&recorder, 3);
        let after_revocation = recorder.latest_estimate();
        let ticks_before = recorder.ticks();
        wait_for_ticks(&recorder, ticks_before + 2);
        recorder.stop();

        assert_eq!(after_revocation, NO_ESTIMATE);
        assert_eq!(recorder.latest_estimate(), NO_ESTIMATE);
    }
}
