//! # DualCam Diagnostics
//!
//! Debugging and diagnostic tools for DualCam.
//! Provides logging setup and per-slot session health reports.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod session_report;

// Re-export main types
pub use debug_logger::{DebugLogger, DEFAULT_LOG_FILTER};
pub use session_report::{SessionReport, SlotReport, WarningReport};
