//! Configuration types and defaults

use crate::DualCamError;
use dualcam_core::{SlotId, MAX_SLOTS};
use dualcam_media::{CaptureSettings, VideoResolution};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of display slots
    pub slot_count: usize,
    /// Resolution hint for every slot stream
    pub ideal_resolution: VideoResolution,
    /// Frame rate hint for every slot stream
    pub frame_rate: f64,
    /// Directory receiving snapshot files
    pub snapshot_dir: PathBuf,
    /// Assign device N to slot N and start it once devices are enumerated
    pub auto_start: bool,
    /// Initial mirror flag per slot; missing entries are not mirrored
    pub mirrored: Vec<bool>,
    /// Buffer size of the session event channel
    pub event_capacity: usize,
    /// Log filter directives for the diagnostics logger
    pub log_filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slot_count: MAX_SLOTS,
            ideal_resolution: VideoResolution::HD,
            frame_rate: 30.0,
            snapshot_dir: PathBuf::from("."),
            auto_start: true,
            mirrored: vec![true, false],
            event_capacity: 64,
            log_filter: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON configuration. Absent fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, DualCamError> {
        let config: SessionConfig =
            serde_json::from_str(json).map_err(|e| DualCamError::config("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<(), DualCamError> {
        if self.slot_count == 0 || self.slot_count > MAX_SLOTS {
            return Err(DualCamError::config(
                "slot_count",
                format!("must be between 1 and {}, got {}", MAX_SLOTS, self.slot_count),
            ));
        }

        if self.ideal_resolution.is_empty() {
            return Err(DualCamError::config(
                "ideal_resolution",
                format!("{} has no pixels", self.ideal_resolution),
            ));
        }

        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 || self.frame_rate > 120.0 {
            return Err(DualCamError::config(
                "frame_rate",
                format!("must be in (0, 120], got {}", self.frame_rate),
            ));
        }

        if self.event_capacity == 0 {
            return Err(DualCamError::config("event_capacity", "must be at least 1"));
        }

        Ok(())
    }

    /// Capture hints handed to every slot controller
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            ideal_resolution: self.ideal_resolution,
            frame_rate: self.frame_rate,
        }
    }

    /// Initial mirror flag of `slot`
    pub fn mirrored_for(&self, slot: SlotId) -> bool {
        self.mirrored.get(slot.index()).copied().unwrap_or(false)
    }
}
