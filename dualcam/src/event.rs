//! Event system for session and slot events

use dualcam_core::{CameraDevice, PermissionState, SlotId};
use dualcam_media::SlotSnapshot;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::warn;

/// Events emitted by a camera session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session permission was resolved
    PermissionChanged {
        /// New permission state
        state: PermissionState,
    },
    /// Video inputs were enumerated after permission was granted
    DevicesEnumerated {
        /// Devices in platform order
        devices: Vec<CameraDevice>,
    },
    /// A slot published a new snapshot.
    ///
    /// Snapshots are coalesced: a slow subscriber may see only the latest
    /// of several quick transitions.
    SlotStateChanged {
        /// Latest slot snapshot
        snapshot: SlotSnapshot,
    },
    /// A slot's device selection changed
    SelectionChanged {
        /// Affected slot
        slot: SlotId,
        /// New selection, `None` when unassigned
        device_id: Option<String>,
    },
    /// A slot's mirror flag changed
    MirrorChanged {
        /// Affected slot
        slot: SlotId,
        /// Whether the slot now renders mirrored
        mirrored: bool,
    },
    /// A snapshot file was written
    SnapshotSaved {
        /// Slot the frame came from
        slot: SlotId,
        /// Path of the written PNG
        path: PathBuf,
    },
}

impl SessionEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::PermissionChanged { .. } => "permission_changed",
            SessionEvent::DevicesEnumerated { .. } => "devices_enumerated",
            SessionEvent::SlotStateChanged { .. } => "slot_state_changed",
            SessionEvent::SelectionChanged { .. } => "selection_changed",
            SessionEvent::MirrorChanged { .. } => "mirror_changed",
            SessionEvent::SnapshotSaved { .. } => "snapshot_saved",
        }
    }

    /// Slot the event concerns, if any
    pub fn slot(&self) -> Option<SlotId> {
        match self {
            SessionEvent::SlotStateChanged { snapshot } => Some(snapshot.slot),
            SessionEvent::SelectionChanged { slot, .. }
            | SessionEvent::MirrorChanged { slot, .. }
            | SessionEvent::SnapshotSaved { slot, .. } => Some(*slot),
            SessionEvent::PermissionChanged { .. } | SessionEvent::DevicesEnumerated { .. } => {
                None
            }
        }
    }

    /// Check if this is a session-wide event
    pub fn is_session_event(&self) -> bool {
        matches!(
            self,
            SessionEvent::PermissionChanged { .. } | SessionEvent::DevicesEnumerated { .. }
        )
    }

    /// Check if this is a slot state or presentation event
    pub fn is_slot_event(&self) -> bool {
        matches!(
            self,
            SessionEvent::SlotStateChanged { .. }
                | SessionEvent::SelectionChanged { .. }
                | SessionEvent::MirrorChanged { .. }
        )
    }

    /// Check if this is a capture event
    pub fn is_capture_event(&self) -> bool {
        matches!(self, SessionEvent::SnapshotSaved { .. })
    }
}

/// Stream of session events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: broadcast::Receiver<SessionEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream.
    ///
    /// Returns `None` once the session is gone. Events dropped because the
    /// subscriber fell behind are skipped with a warning.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<SessionEvent>, broadcast::error::TryRecvError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(closed) => return Err(closed),
            }
        }
    }

    /// Restrict this stream to events matching `filter`
    pub fn filtered(self, filter: EventFilter) -> FilteredEventStream {
        FilteredEventStream::new(self, filter)
    }
}

/// Event filter for selective event processing
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Whether to include session-wide events
    pub include_session_events: bool,
    /// Whether to include slot events
    pub include_slot_events: bool,
    /// Whether to include capture events
    pub include_capture_events: bool,
    /// Only pass slot-scoped events for this slot
    pub slot: Option<SlotId>,
    /// Specific event types to include (if specified, overrides other filters)
    pub specific_event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter that includes all events
    pub fn all() -> Self {
        Self {
            include_session_events: true,
            include_slot_events: true,
            include_capture_events: true,
            slot: None,
            specific_event_types: None,
        }
    }

    /// Create a filter that includes only slot events
    pub fn slot_only() -> Self {
        Self {
            include_session_events: false,
            include_slot_events: true,
            include_capture_events: false,
            slot: None,
            specific_event_types: None,
        }
    }

    /// Create a filter for everything that concerns one slot
    pub fn for_slot(slot: SlotId) -> Self {
        Self {
            include_session_events: false,
            slot: Some(slot),
            ..Self::all()
        }
    }

    /// Create a filter for specific event types
    pub fn specific(event_types: Vec<String>) -> Self {
        Self {
            include_session_events: false,
            include_slot_events: false,
            include_capture_events: false,
            slot: None,
            specific_event_types: Some(event_types),
        }
    }

    /// Check if an event should be included based on this filter
    pub fn should_include(&self, event: &SessionEvent) -> bool {
        if let (Some(wanted), Some(slot)) = (self.slot, event.slot()) {
            if wanted != slot {
                return false;
            }
        }

        if let Some(ref specific_types) = self.specific_event_types {
            return specific_types.iter().any(|t| t == event.event_type());
        }

        (self.include_session_events && event.is_session_event())
            || (self.include_slot_events && event.is_slot_event())
            || (self.include_capture_events && event.is_capture_event())
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Filtered event stream that only yields events matching a filter
#[derive(Debug)]
pub struct FilteredEventStream {
    stream: EventStream,
    filter: EventFilter,
}

impl FilteredEventStream {
    /// Create a new filtered event stream
    pub fn new(stream: EventStream, filter: EventFilter) -> Self {
        Self { stream, filter }
    }

    /// Get the next event that matches the filter
    pub async fn next(&mut self) -> Option<SessionEvent> {
        while let Some(event) = self.stream.next().await {
            if self.filter.should_include(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Try to get the next filtered event without blocking
    pub fn try_next(&mut self) -> Result<Option<SessionEvent>, broadcast::error::TryRecvError> {
        while let Some(event) = self.stream.try_next()? {
            if self.filter.should_include(&event) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Update the filter
    pub fn set_filter(&mut self, filter: EventFilter) {
        self.filter = filter;
    }

    /// Get the current filter
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}
