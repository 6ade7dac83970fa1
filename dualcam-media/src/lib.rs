//! # DualCam Media
//!
//! Camera capture for DualCam: the capture backend seam, the device
//! catalog, the per-slot stream controller and still snapshots.

#![warn(clippy::all)]

pub mod capture;
pub mod catalog;
pub mod controller;
pub mod error;
pub mod snapshot;
pub mod tracks;

// Re-export main types
pub use capture::mock::{MockCaptureBackend, MockDevice, MockDeviceBehavior};
#[cfg(feature = "native")]
pub use capture::native::NativeCaptureBackend;
pub use capture::{get_platform_backend, CaptureBackend, StreamConstraints};
pub use catalog::DeviceCatalog;
pub use controller::{
    CaptureSettings, SlotController, SlotFailure, SlotSnapshot, SlotState, SlotStatus,
    StartOutcome, ToggleOutcome,
};
pub use error::{ErrorCategory, MediaError, MediaResult, OPEN_CAMERA_FAILED_MESSAGE};
pub use snapshot::{encode_png, snapshot, snapshot_file_name, SnapshotWriter};
pub use tracks::{
    ActiveStream, CaptureTrack, TrackSettings, VideoFrame, VideoPixelFormat, VideoResolution,
};
