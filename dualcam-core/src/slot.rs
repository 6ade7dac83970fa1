//! Slot identity and session-wide permission state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of display slots a session can hold
pub const MAX_SLOTS: usize = 2;

/// Identity of a display slot, numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotId(u8);

impl SlotId {
    /// First slot
    pub const FIRST: SlotId = SlotId(1);
    /// Second slot
    pub const SECOND: SlotId = SlotId(2);

    /// Create a slot id from its 1-based number
    pub fn new(number: u8) -> Option<Self> {
        if number == 0 || number as usize > MAX_SLOTS {
            return None;
        }
        Some(Self(number))
    }

    /// Create a slot id from a 0-based index
    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_add(1)
            .and_then(|number| u8::try_from(number).ok())
            .and_then(Self::new)
    }

    /// 1-based slot number, as used in snapshot file names
    pub fn number(&self) -> u8 {
        self.0
    }

    /// 0-based position in the session's slot collection
    pub fn index(&self) -> usize {
        self.0 as usize - 1
    }

    /// Presentation label ("Feed A", "Feed B")
    pub fn label(&self) -> String {
        let letter = (b'A' + self.0 - 1) as char;
        format!("Feed {}", letter)
    }
}

impl TryFrom<u8> for SlotId {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number)
            .ok_or_else(|| format!("slot must be between 1 and {}, got {}", MAX_SLOTS, number))
    }
}

impl From<SlotId> for u8 {
    fn from(slot: SlotId) -> Self {
        slot.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Session-wide camera permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PermissionState {
    /// Startup state, before the probe ran
    #[default]
    NotYetRequested,
    /// Capture access granted
    Granted,
    /// Capture access refused; terminal for the session
    Denied,
}

impl PermissionState {
    /// Whether the permission has been resolved one way or the other
    pub fn is_resolved(&self) -> bool {
        !matches!(self, PermissionState::NotYetRequested)
    }

    /// Whether camera features are available
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }

    /// Only the first resolution is accepted; afterwards the state is fixed
    pub fn can_transition_to(&self, next: PermissionState) -> bool {
        matches!(self, PermissionState::NotYetRequested) && next.is_resolved()
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionState::NotYetRequested => "not-yet-requested",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
        };
        f.write_str(name)
    }
}
