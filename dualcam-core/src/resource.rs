//! Hardware track accounting
//!
//! Every slot may hold at most one live camera track at a time. The
//! [`TrackLedger`] records each open and release so leaks show up as
//! warnings and in diagnostics reports instead of as a locked camera.

use crate::slot::SlotId;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Live tracks a single slot may hold
pub const MAX_LIVE_TRACKS_PER_SLOT: u32 = 1;

/// Track usage of one slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotTrackUsage {
    /// Tracks opened over the session
    pub opened: u64,
    /// Tracks released over the session
    pub released: u64,
    /// Tracks currently live
    pub live: u32,
    /// Highest simultaneous live count observed
    pub peak_live: u32,
}

/// Resource warning types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResourceWarning {
    /// A slot holds more live tracks than allowed
    TrackLeak {
        /// Offending slot
        slot: SlotId,
        /// Live track count at the time of the warning
        live: u32,
    },
    /// A release was recorded for tracks the ledger never saw open
    UnbalancedRelease {
        /// Offending slot
        slot: SlotId,
        /// Number of tracks in the release
        tracks: u32,
    },
}

impl ResourceWarning {
    /// Get severity level of the warning
    pub fn severity(&self) -> WarningSeverity {
        match self {
            ResourceWarning::TrackLeak { .. } => WarningSeverity::Critical,
            ResourceWarning::UnbalancedRelease { .. } => WarningSeverity::Medium,
        }
    }

    /// Get recommended action for this warning
    pub fn recommended_action(&self) -> String {
        match self {
            ResourceWarning::TrackLeak { slot, .. } => {
                format!("Stop {} to release the camera before reopening it", slot)
            }
            ResourceWarning::UnbalancedRelease { .. } => {
                "Check that every stream is released exactly once".to_string()
            }
        }
    }
}

/// Warning severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum WarningSeverity {
    /// Low severity warning
    Low,
    /// Medium severity warning
    Medium,
    /// High severity warning
    High,
    /// Critical severity warning
    Critical,
}

/// Per-slot open/release accounting shared by all slot controllers
#[derive(Debug, Default)]
pub struct TrackLedger {
    usage: RwLock<HashMap<SlotId, SlotTrackUsage>>,
    warnings: RwLock<Vec<ResourceWarning>>,
}

impl TrackLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tracks` newly opened tracks for `slot`
    pub fn record_open(&self, slot: SlotId, tracks: u32) {
        let live = {
            let mut usage = self.usage.write();
            let entry = usage.entry(slot).or_default();
            entry.opened += u64::from(tracks);
            entry.live += tracks;
            entry.peak_live = entry.peak_live.max(entry.live);
            entry.live
        };

        debug!("{}: opened {} track(s), {} live", slot, tracks, live);

        if live > MAX_LIVE_TRACKS_PER_SLOT {
            warn!("{}: {} live tracks, expected at most {}", slot, live, MAX_LIVE_TRACKS_PER_SLOT);
            self.warnings
                .write()
                .push(ResourceWarning::TrackLeak { slot, live });
        }
    }

    /// Record `tracks` released tracks for `slot`
    pub fn record_release(&self, slot: SlotId, tracks: u32) {
        let unbalanced = {
            let mut usage = self.usage.write();
            let entry = usage.entry(slot).or_default();
            entry.released += u64::from(tracks);
            let unbalanced = tracks > entry.live;
            entry.live = entry.live.saturating_sub(tracks);
            unbalanced
        };

        debug!("{}: released {} track(s)", slot, tracks);

        if unbalanced {
            warn!("{}: released more tracks than were open", slot);
            self.warnings
                .write()
                .push(ResourceWarning::UnbalancedRelease { slot, tracks });
        }
    }

    /// Current usage for `slot`
    pub fn usage(&self, slot: SlotId) -> SlotTrackUsage {
        self.usage.read().get(&slot).copied().unwrap_or_default()
    }

    /// Live tracks across every slot
    pub fn total_live(&self) -> u32 {
        self.usage.read().values().map(|u| u.live).sum()
    }

    /// Warnings raised so far
    pub fn warnings(&self) -> Vec<ResourceWarning> {
        self.warnings.read().clone()
    }
}
