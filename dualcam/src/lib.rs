//! # DualCam - Two Camera Feeds, One Session
//!
//! DualCam shows two independent camera feeds side by side. Each display
//! slot owns at most one live hardware stream and can be started, stopped,
//! toggled, pointed at another device or snapshotted without disturbing
//! the other slot.
//!
//! ## Key Features
//!
//! - **One-time permission gate**: a single probe unlocks the device list
//!   or denies every camera feature for the session
//! - **No leaked cameras**: a slot always releases its old stream before
//!   opening a new one, and late acquisitions are released on arrival
//! - **Observable state**: per-slot watch channels and a session event stream
//! - **Snapshots**: one frame at native size, saved as
//!   `capture-{slot}-{epoch millis}.png`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dualcam::{CameraSession, SessionConfig, SlotId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = CameraSession::with_platform_backend(SessionConfig::default())?;
//!
//!     // Probe permission, pick device N for slot N and start both
//!     let devices = session.initialize().await?;
//!     println!("{} camera(s)", devices.len());
//!
//!     // Save a frame from the first feed
//!     if let Some(path) = session.snapshot(SlotId::FIRST).await? {
//!         println!("saved {}", path.display());
//!     }
//!
//!     // Handle events
//!     let mut events = session.subscribe();
//!     while let Some(event) = events.next().await {
//!         println!("Session event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use dualcam_core::{
    CameraDevice, DualCamError, PermissionState, ResourceWarning, SlotId, SlotTrackUsage,
    TrackLedger, WarningSeverity, MAX_SLOTS,
};

pub use dualcam_media::{
    get_platform_backend, CaptureBackend, MediaError, MockCaptureBackend, MockDevice,
    MockDeviceBehavior, SlotController, SlotSnapshot, SlotStatus, StartOutcome, ToggleOutcome,
    VideoResolution, OPEN_CAMERA_FAILED_MESSAGE,
};

#[cfg(feature = "native")]
pub use dualcam_media::NativeCaptureBackend;

#[cfg(feature = "diagnostics")]
pub use dualcam_diagnostics::{DebugLogger, SessionReport, SlotReport};

// Public API modules
pub mod config;
pub mod event;
pub mod session;
pub mod view;

// Re-export main API types
pub use config::SessionConfig;
pub use event::{EventFilter, EventStream, FilteredEventStream, SessionEvent};
pub use session::{CameraSession, SlotStartResult};
pub use view::{RenderState, Screen, SessionView, SlotView};

/// Install the global log subscriber using the session's `log_filter`
///
/// # Example
/// ```rust,no_run
/// let config = dualcam::SessionConfig::default();
/// dualcam::init_logging(&config)?;
/// # Ok::<(), dualcam::DualCamError>(())
/// ```
#[cfg(feature = "diagnostics")]
pub fn init_logging(config: &SessionConfig) -> Result<(), DualCamError> {
    DebugLogger::new(config.log_filter.as_str()).install()
}
