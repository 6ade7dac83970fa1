//! Presentation view model
//!
//! Plain data derived from the session for rendering: the permission
//! gate, the device choices and one [`SlotView`] per slot. The mirror
//! flag lives only here; it never reaches the slot controllers.

use dualcam_core::{CameraDevice, PermissionState, SlotId};
use dualcam_media::{SlotSnapshot, SlotStatus, VideoResolution};
use serde::Serialize;

/// What a slot should draw, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderState {
    /// Acquisition in progress
    Loading,
    /// Last start failed; show the error text
    Error,
    /// Live video
    Active,
    /// Nothing to show
    Inactive,
}

/// Which top-level screen the session shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Screen {
    /// Waiting for the permission probe
    RequestingPermission,
    /// Capture refused; every camera feature is gated off
    PermissionDenied,
    /// Slots and device selection are available
    Monitor,
}

impl From<PermissionState> for Screen {
    fn from(state: PermissionState) -> Self {
        match state {
            PermissionState::NotYetRequested => Screen::RequestingPermission,
            PermissionState::Denied => Screen::PermissionDenied,
            PermissionState::Granted => Screen::Monitor,
        }
    }
}

/// Render model of one slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    /// Slot shown
    pub slot: SlotId,
    /// Feed label, "Feed A" or "Feed B"
    pub label: String,
    /// What to draw
    pub render: RenderState,
    /// Error text when `render` is `Error`
    pub error: Option<String>,
    /// Stream shown when `render` is `Active`
    pub stream_id: Option<String>,
    /// Native size of the shown stream, when known
    pub resolution: Option<VideoResolution>,
    /// Selected device id
    pub selection: Option<String>,
    /// Label of the selected device
    pub selection_label: Option<String>,
    /// Flip the video horizontally
    pub mirrored: bool,
}

impl SlotView {
    /// Build the view of one slot
    pub fn new(snapshot: &SlotSnapshot, mirrored: bool, devices: &[CameraDevice]) -> Self {
        let (render, error, stream_id, resolution) = match &snapshot.status {
            SlotStatus::Acquiring { .. } => (RenderState::Loading, None, None, None),
            SlotStatus::Failed(failure) => {
                (RenderState::Error, Some(failure.message.clone()), None, None)
            }
            SlotStatus::Active {
                stream_id,
                resolution,
                ..
            } => (RenderState::Active, None, Some(stream_id.clone()), *resolution),
            SlotStatus::Idle => (RenderState::Inactive, None, None, None),
        };

        let selection_label = snapshot.selection.as_ref().and_then(|id| {
            devices
                .iter()
                .find(|d| &d.id == id)
                .map(|d| d.label.clone())
        });

        Self {
            slot: snapshot.slot,
            label: snapshot.slot.label(),
            render,
            error,
            stream_id,
            resolution,
            selection: snapshot.selection.clone(),
            selection_label,
            mirrored,
        }
    }

    /// Snapshot button is offered only on live video
    pub fn can_snapshot(&self) -> bool {
        self.render == RenderState::Active
    }

    /// Caption of the start/stop control
    pub fn toggle_label(&self) -> &'static str {
        match self.render {
            RenderState::Active => "Stop",
            _ => "Start",
        }
    }
}

/// Render model of the whole session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    /// Top-level screen
    pub screen: Screen,
    /// Choices for the device dropdowns
    pub devices: Vec<CameraDevice>,
    /// One view per slot, in slot order
    pub slots: Vec<SlotView>,
}

impl SessionView {
    /// View of `slot`, if the session has it
    pub fn slot(&self, slot: SlotId) -> Option<&SlotView> {
        self.slots.iter().find(|view| view.slot == slot)
    }

    /// Slots currently showing live video
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|view| view.render == RenderState::Active)
            .count()
    }
}
