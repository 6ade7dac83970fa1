//! Camera device descriptors
//!
//! The platform reports raw descriptors for every media device it knows
//! about. Only video inputs become [`CameraDevice`]s.

use serde::{Deserialize, Serialize};

/// Number of id characters used when the platform withholds a label
pub const LABEL_FALLBACK_ID_CHARS: usize = 5;

/// Kind of media device reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Camera or other video source
    VideoInput,
    /// Microphone
    AudioInput,
    /// Speaker or headset
    AudioOutput,
}

/// Device descriptor as reported by the platform, before filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeviceInfo {
    /// Platform-assigned identifier
    pub device_id: String,
    /// Device kind
    pub kind: DeviceKind,
    /// Human-readable label, empty when withheld
    pub label: String,
}

impl RawDeviceInfo {
    /// Create a video-input descriptor
    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: DeviceKind::VideoInput,
            label: label.into(),
        }
    }
}

/// A selectable camera, identified by `id` for the whole session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraDevice {
    /// Stable identifier within the session
    pub id: String,
    /// Display label
    pub label: String,
}

impl CameraDevice {
    /// Build the catalog view of a raw descriptor.
    ///
    /// Returns `None` for anything that is not a video input. An empty
    /// label falls back to `Camera <first five id characters>`.
    pub fn from_raw(raw: &RawDeviceInfo) -> Option<Self> {
        if raw.kind != DeviceKind::VideoInput {
            return None;
        }

        let label = if raw.label.trim().is_empty() {
            let short: String = raw.device_id.chars().take(LABEL_FALLBACK_ID_CHARS).collect();
            format!("Camera {}", short)
        } else {
            raw.label.clone()
        };

        Some(Self {
            id: raw.device_id.clone(),
            label,
        })
    }
}
