use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use peakhz_foundation::CaptureError;

/// Resolves the capture device for a session.
pub struct DeviceManager {
    host: Host,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Capture authorization probe. There is no explicit permission API at
    /// this layer; a denied or revoked microphone permission surfaces
    /// through cpal as an empty input device list, so device visibility
    /// stands in for the check. Called at open time and again on every
    /// block read, since authorization can be revoked while a session is
    /// live.
    pub fn capture_authorized(&self) -> Result<(), CaptureError> {
        match self.host.input_devices() {
            Ok(mut devices) => {
                if devices.next().is_some() {
                    Ok(())
                } else {
                    Err(CaptureError::PermissionDenied)
                }
            }
            Err(e) => Err(CaptureError::DeviceUnavailable {
                reason: e.to_string(),
            }),
        }
    }

    /// Resolve the capture device: exact name match when one is requested,
    /// otherwise the host default input.
    pub fn open_device(&self, name: Option<&str>) -> Result<Device, CaptureError> {
        self.capture_authorized()?;

        if let Some(requested) = name {
            return self
                .find_device_by_name(requested)
                .ok_or(CaptureError::DeviceNotFound {
                    name: Some(requested.to_string()),
                });
        }

        self.host
            .default_input_device()
            .ok_or(CaptureError::DeviceNotFound { name: None })
    }

    fn find_device_by_name(&self, name: &str) -> Option<Device> {
        if let Ok(devices) = self.host.input_devices() {
            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name == name {
                        return Some(device);
                    }
                }
            }
        }
        None
    }
}
