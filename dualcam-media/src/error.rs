//! Media error types and handling
//!
//! This module defines the error taxonomy of the capture layer. Device
//! failures stay distinguishable here for diagnostics and tests, while
//! [`MediaError::user_message`] collapses them into the single message a
//! slot shows to the user.

use dualcam_core::DualCamError;
use thiserror::Error;

/// Message shown on a slot when its camera could not be opened
pub const OPEN_CAMERA_FAILED_MESSAGE: &str = "Could not open camera. It may be in use.";

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Capture access refused by the user or OS policy, or no capture device exists
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Failure reason
        reason: String,
    },

    /// Requested device does not exist (unplugged or invalid selection)
    #[error("Device unavailable: {device_id}")]
    DeviceUnavailable {
        /// Device identifier
        device_id: String,
    },

    /// Device is claimed exclusively elsewhere
    #[error("Device busy: {device_id}")]
    DeviceBusy {
        /// Device identifier
        device_id: String,
    },

    /// Snapshot could not be encoded
    #[error("Capture encode failure: {reason}")]
    CaptureEncodeFailure {
        /// Failure reason
        reason: String,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Operation requires a live stream
    #[error("Capture not active")]
    CaptureNotActive,

    /// Backend-specific failure that fits no other variant
    #[error("Backend error: {backend} - {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if error is recoverable by the user re-triggering the operation
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Io { .. } => true,
            MediaError::PermissionDenied { .. } => false,
            MediaError::DeviceUnavailable { .. } => true,
            MediaError::DeviceBusy { .. } => true,
            MediaError::CaptureEncodeFailure { .. } => true,
            MediaError::InvalidConfiguration { .. } => false,
            MediaError::CaptureNotActive => true,
            MediaError::Backend { .. } => true,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::Io { .. } => ErrorCategory::System,
            MediaError::PermissionDenied { .. } => ErrorCategory::Permission,
            MediaError::DeviceUnavailable { .. } => ErrorCategory::Device,
            MediaError::DeviceBusy { .. } => ErrorCategory::Device,
            MediaError::CaptureEncodeFailure { .. } => ErrorCategory::Capture,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::CaptureNotActive => ErrorCategory::State,
            MediaError::Backend { .. } => ErrorCategory::Platform,
        }
    }

    /// Stable code for diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            MediaError::Io { .. } => "IO_ERROR",
            MediaError::PermissionDenied { .. } => "PERMISSION_DENIED",
            MediaError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            MediaError::DeviceBusy { .. } => "DEVICE_BUSY",
            MediaError::CaptureEncodeFailure { .. } => "CAPTURE_ENCODE_FAILURE",
            MediaError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            MediaError::CaptureNotActive => "CAPTURE_NOT_ACTIVE",
            MediaError::Backend { .. } => "BACKEND_ERROR",
        }
    }

    /// Text shown to the user; device failures share one message
    pub fn user_message(&self) -> String {
        match self {
            MediaError::DeviceUnavailable { .. }
            | MediaError::DeviceBusy { .. }
            | MediaError::Backend { .. }
            | MediaError::Io { .. } => OPEN_CAMERA_FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// System-level errors (I/O)
    System,
    /// Session-wide capture permission
    Permission,
    /// Device and hardware errors
    Device,
    /// Snapshot encoding errors
    Capture,
    /// Configuration and parameter errors
    Configuration,
    /// State management errors
    State,
    /// Platform backend errors
    Platform,
}

impl From<MediaError> for DualCamError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied { reason } => DualCamError::PermissionDenied { reason },
            MediaError::InvalidConfiguration { message } => DualCamError::InvalidConfiguration {
                field: "capture".to_string(),
                reason: message,
            },
            other => DualCamError::Media {
                code: other.code(),
                reason: other.to_string(),
            },
        }
    }
}
