//! Session health reports
//!
//! A [`SessionReport`] is a point-in-time view of the permission state,
//! every slot and the hardware track ledger. Reports are plain data and
//! serialize to JSON for bug reports and the demo's `--report` output.

use chrono::{DateTime, Utc};
use dualcam_core::{
    PermissionState, ResourceWarning, SlotId, SlotTrackUsage, TrackLedger, WarningSeverity,
};
use dualcam_media::{SlotSnapshot, SlotStatus};
use serde::Serialize;

/// Health of one slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotReport {
    /// Slot the report describes
    pub slot: SlotId,
    /// Display label of the slot
    pub label: String,
    /// Observable slot status
    pub status: SlotStatus,
    /// Device selected for the slot
    pub selection: Option<String>,
    /// Revision of the snapshot the report was built from
    pub revision: u64,
    /// Hardware track accounting for the slot
    pub usage: SlotTrackUsage,
    /// Diagnostic code of the current failure, if any
    pub last_error_code: Option<&'static str>,
}

impl SlotReport {
    /// Build the report for one slot
    pub fn from_snapshot(snapshot: &SlotSnapshot, ledger: &TrackLedger) -> Self {
        let last_error_code = match &snapshot.status {
            SlotStatus::Failed(failure) => Some(failure.code),
            _ => None,
        };

        Self {
            slot: snapshot.slot,
            label: snapshot.slot.label(),
            status: snapshot.status.clone(),
            selection: snapshot.selection.clone(),
            revision: snapshot.revision,
            usage: ledger.usage(snapshot.slot),
            last_error_code,
        }
    }

    /// Live tracks disagree with what the slot shows
    pub fn has_track_mismatch(&self) -> bool {
        let expected = u32::from(matches!(self.status, SlotStatus::Active { .. }));
        self.usage.live != expected
    }
}

/// A ledger warning with its triage hints
#[derive(Debug, Clone, Serialize)]
pub struct WarningReport {
    /// Raised warning
    pub warning: ResourceWarning,
    /// Severity of the warning
    pub severity: WarningSeverity,
    /// Suggested remedy
    pub recommended_action: String,
}

impl From<ResourceWarning> for WarningReport {
    fn from(warning: ResourceWarning) -> Self {
        Self {
            severity: warning.severity(),
            recommended_action: warning.recommended_action(),
            warning,
        }
    }
}

/// Point-in-time health report for a camera session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Capture backend in use
    pub backend: String,
    /// Session permission state
    pub permission: PermissionState,
    /// Number of enumerated cameras
    pub device_count: usize,
    /// One entry per slot, in slot order
    pub slots: Vec<SlotReport>,
    /// Live hardware tracks across all slots
    pub live_tracks: u32,
    /// Ledger warnings raised so far
    pub warnings: Vec<WarningReport>,
}

impl SessionReport {
    /// Collect a report from the session's parts
    pub fn collect(
        backend: impl Into<String>,
        permission: PermissionState,
        device_count: usize,
        slots: &[SlotSnapshot],
        ledger: &TrackLedger,
    ) -> Self {
        let mut slots: Vec<SlotReport> = slots
            .iter()
            .map(|snapshot| SlotReport::from_snapshot(snapshot, ledger))
            .collect();
        slots.sort_by_key(|report| report.slot);

        Self {
            generated_at: Utc::now(),
            backend: backend.into(),
            permission,
            device_count,
            slots,
            live_tracks: ledger.total_live(),
            warnings: ledger.warnings().into_iter().map(WarningReport::from).collect(),
        }
    }

    /// Slots currently holding a stream
    pub fn active_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.status, SlotStatus::Active { .. }))
            .count()
    }

    /// No warnings, and every slot holds exactly the tracks it shows
    pub fn is_healthy(&self) -> bool {
        self.warnings.is_empty() && !self.slots.iter().any(SlotReport::has_track_mismatch)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "permission {}, {} camera(s), {}/{} slot(s) active, {} live track(s), {} warning(s)",
            self.permission,
            self.device_count,
            self.active_slots(),
            self.slots.len(),
            self.live_tracks,
            self.warnings.len()
        )
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
