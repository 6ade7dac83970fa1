//! Error types for DualCam

use thiserror::Error;

/// Main error type for DualCam session operations
#[derive(Error, Debug)]
pub enum DualCamError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Invalid configuration error
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration {
        /// Offending configuration field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Slot index outside the configured range
    #[error("Invalid slot {slot}: session has {slot_count} slots")]
    InvalidSlot {
        /// Requested slot number
        slot: u8,
        /// Number of slots in the session
        slot_count: usize,
    },

    /// Camera access was refused for the whole session
    #[error("Camera permission denied: {reason}")]
    PermissionDenied {
        /// Reason reported by the platform
        reason: String,
    },

    /// Media layer error scoped to one slot or snapshot
    #[error("Media error: {reason}")]
    Media {
        /// Stable error code of the media error
        code: &'static str,
        /// Description of the media failure
        reason: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl DualCamError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            DualCamError::Initialization { .. } => "INITIALIZATION_FAILED",
            DualCamError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            DualCamError::InvalidSlot { .. } => "INVALID_SLOT",
            DualCamError::PermissionDenied { .. } => "PERMISSION_DENIED",
            DualCamError::Media { code, .. } => code,
            DualCamError::InvalidState { .. } => "INVALID_STATE",
        }
    }

    /// Whether this error gates every camera feature for the session
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, DualCamError::PermissionDenied { .. })
    }

    /// Shorthand for configuration errors
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DualCamError::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
