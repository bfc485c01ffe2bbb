use crate::geometry::Point;

use super::SelectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Other(u32),
}

impl PointerButton {
    /// Maps a GDK button number (1 = primary, 3 = secondary).
    pub const fn from_gdk(button: u32) -> Self {
        match button {
            1 => Self::Primary,
            3 => Self::Secondary,
            other => Self::Other(other),
        }
    }
}

/// Input delivered to the selection machine. Points are global coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    Press { button: PointerButton, at: Point },
    Move { at: Point },
    Release { button: PointerButton, at: Point },
    CancelKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: SelectionState,
    pub event: SelectionEvent,
    pub to: SelectionState,
}

impl StateTransition {
    pub const fn new(from: SelectionState, event: SelectionEvent, to: SelectionState) -> Self {
        Self { from, event, to }
    }
}
