//! # DualCam Core
//!
//! Shared vocabulary for the DualCam workspace: camera device descriptors,
//! slot identity, the session permission state, session errors and the
//! hardware track ledger.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod resource;
pub mod slot;

// Re-export main types
pub use device::{CameraDevice, DeviceKind, RawDeviceInfo, LABEL_FALLBACK_ID_CHARS};
pub use error::DualCamError;
pub use resource::{
    ResourceWarning, SlotTrackUsage, TrackLedger, WarningSeverity, MAX_LIVE_TRACKS_PER_SLOT,
};
pub use slot::{PermissionState, SlotId, MAX_SLOTS};
