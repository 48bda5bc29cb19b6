use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Capture subsystem error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Audio capture permission denied")]
    PermissionDenied,

    #[error("Capture device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),
}

impl CaptureError {
    /// Permission failures are the only capture errors the host can fix
    /// and retry without a configuration change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied)
    }
}
