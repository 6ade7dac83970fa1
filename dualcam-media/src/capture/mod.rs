pub mod mock;
#[cfg(feature = "native")]
pub mod native;

use crate::error::{MediaError, MediaResult};
use crate::tracks::{ActiveStream, VideoResolution};
use async_trait::async_trait;
use dualcam_core::RawDeviceInfo;
use std::sync::Arc;

/// Frame size requested for the permission probe
pub const PROBE_RESOLUTION: VideoResolution = VideoResolution::VGA;

/// What a capture request asks the platform for.
///
/// Resolution and frame rate are hints; the platform may open the device
/// at its native format instead.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConstraints {
    /// Exact device to open; `None` lets the platform choose (permission probe)
    pub device_id: Option<String>,
    pub ideal_resolution: VideoResolution,
    pub frame_rate: f64,
}

impl StreamConstraints {
    /// Constraints for opening a specific device
    pub fn for_device(
        device_id: impl Into<String>,
        ideal_resolution: VideoResolution,
        frame_rate: f64,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            ideal_resolution,
            frame_rate,
        }
    }

    /// Minimal request used only to unlock device labels
    pub fn probe() -> Self {
        Self {
            device_id: None,
            ideal_resolution: PROBE_RESOLUTION,
            frame_rate: 15.0,
        }
    }

    /// Validate constraints
    pub fn validate(&self) -> MediaResult<()> {
        if self.ideal_resolution.is_empty() {
            return Err(MediaError::InvalidConfiguration {
                message: format!("Invalid resolution {}", self.ideal_resolution),
            });
        }

        if self.frame_rate <= 0.0 || self.frame_rate > 120.0 {
            return Err(MediaError::InvalidConfiguration {
                message: format!("Invalid framerate {}", self.frame_rate),
            });
        }

        if matches!(&self.device_id, Some(id) if id.is_empty()) {
            return Err(MediaError::InvalidConfiguration {
                message: "Empty device id".to_string(),
            });
        }

        Ok(())
    }
}

/// Platform media-capture API
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logs and diagnostics
    fn name(&self) -> &str;

    /// Open a live stream matching `constraints`.
    ///
    /// Fails with `PermissionDenied`, `DeviceUnavailable` or `DeviceBusy`.
    async fn open_stream(&self, constraints: &StreamConstraints) -> MediaResult<ActiveStream>;

    /// List every media device the platform reports, in platform order
    async fn enumerate_devices(&self) -> MediaResult<Vec<RawDeviceInfo>>;
}

/// Get the appropriate platform capture backend
pub fn get_platform_backend() -> Arc<dyn CaptureBackend> {
    #[cfg(feature = "native")]
    {
        Arc::new(native::NativeCaptureBackend::new())
    }
    #[cfg(not(feature = "native"))]
    {
        tracing::warn!("Built without native capture, using mock camera backend");
        Arc::new(mock::MockCaptureBackend::with_cameras(&["Mock Camera"]))
    }
}
