use super::error::{StateError, StateResult};
use super::event::{PointerButton, SelectionEvent, StateTransition};
use super::model::{SelectionSession, SelectionState};
use crate::geometry::{Point, Rect};

/// What the overlay should do after feeding an event to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Ignored,
    /// A press landed on a reserved control; the overlay handles it itself.
    ReservedControl,
    Started,
    Updated,
    /// Final selection in capture space (relative to the virtual desktop origin).
    Committed(Rect),
    Cancelled,
}

#[derive(Debug)]
pub struct SelectionMachine {
    state: SelectionState,
    session: SelectionSession,
    desktop: Rect,
    reserved: Vec<Rect>,
    transition_history: Vec<StateTransition>,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self {
            state: SelectionState::default(),
            session: SelectionSession::default(),
            desktop: Rect::default(),
            reserved: Vec::new(),
            transition_history: Vec::new(),
        }
    }

    /// Starts a fresh session over `desktop`, discarding everything from any
    /// previous session regardless of the state it was left in.
    pub fn begin(&mut self, desktop: Rect) {
        tracing::debug!(previous = ?self.state, ?desktop, "begin selection session");
        self.state = SelectionState::Idle;
        self.session = SelectionSession::default();
        self.desktop = desktop;
        self.reserved.clear();
        self.transition_history.clear();
    }

    /// Global-coordinate regions whose primary presses never start a drag.
    pub fn set_reserved_regions(&mut self, regions: Vec<Rect>) {
        self.reserved = regions;
    }

    /// Returns to `Idle` once the overlay has acted on a terminal outcome.
    pub fn finish(&mut self) {
        self.state = SelectionState::Idle;
        self.session = SelectionSession::default();
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn session(&self) -> SelectionSession {
        self.session
    }

    pub fn virtual_desktop(&self) -> Rect {
        self.desktop
    }

    /// Selection currently being dragged, in global coordinates.
    pub fn drag_rect(&self) -> Option<Rect> {
        (self.state == SelectionState::Dragging)
            .then(|| Rect::from_corners(self.session.start, self.session.end))
    }

    pub fn can_transition(&self, event: SelectionEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: SelectionEvent) -> Option<SelectionState> {
        use PointerButton::{Primary, Secondary};
        use SelectionEvent::*;
        use SelectionState::{Cancelled, Committed, Dragging, Idle};

        match (self.state, event) {
            (Idle, Press { button: Primary, at }) if !self.is_reserved(at) => Some(Dragging),
            (Idle | Dragging, Press { button: Secondary, .. }) => Some(Cancelled),
            (Idle | Dragging, CancelKey) => Some(Cancelled),
            (Dragging, Move { .. }) => Some(Dragging),
            (Dragging, Release { button: Primary, .. }) => Some(Committed),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: SelectionEvent) -> StateResult<SelectionOutcome> {
        if self.is_reserved_press(event) {
            tracing::debug!(?event, "press consumed by reserved control");
            return Ok(SelectionOutcome::ReservedControl);
        }

        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid selection transition requested");
            StateError::InvalidStateTransition { from, event }
        })?;

        let outcome = self.apply(event, next);
        let record = StateTransition::new(self.state, event, next);
        self.state = next;
        self.transition_history.push(record);

        Ok(outcome)
    }

    /// Like [`transition`](Self::transition), but treats events the current
    /// state does not accept as no-ops. Pointer motion while idle is routine.
    pub fn handle(&mut self, event: SelectionEvent) -> SelectionOutcome {
        if !self.is_reserved_press(event) && !self.can_transition(event) {
            return SelectionOutcome::Ignored;
        }
        self.transition(event).unwrap_or(SelectionOutcome::Ignored)
    }

    fn apply(&mut self, event: SelectionEvent, next: SelectionState) -> SelectionOutcome {
        match (event, next) {
            (_, SelectionState::Cancelled) => {
                self.session = SelectionSession::default();
                SelectionOutcome::Cancelled
            }
            (SelectionEvent::Press { at, .. }, SelectionState::Dragging) => {
                self.session = SelectionSession::anchored_at(at);
                SelectionOutcome::Started
            }
            (SelectionEvent::Move { at }, SelectionState::Dragging) => {
                self.session.end = at;
                SelectionOutcome::Updated
            }
            (SelectionEvent::Release { at, .. }, SelectionState::Committed) => {
                self.session.end = at;
                self.session.dragging = false;
                SelectionOutcome::Committed(self.capture_rect())
            }
            _ => SelectionOutcome::Ignored,
        }
    }

    fn capture_rect(&self) -> Rect {
        Rect::from_corners(self.session.start, self.session.end).relative_to(self.desktop.origin())
    }

    fn is_reserved(&self, point: Point) -> bool {
        self.reserved.iter().any(|region| region.contains(point))
    }

    fn is_reserved_press(&self, event: SelectionEvent) -> bool {
        match event {
            SelectionEvent::Press {
                button: PointerButton::Primary,
                at,
            } => !self.state.is_terminal() && self.is_reserved(at),
            _ => false,
        }
    }
}

#[cfg(test)]
impl SelectionMachine {
    fn history(&self) -> &[StateTransition] {
        &self.transition_history
    }
}

impl Default for SelectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SelectionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SelectionState::{:?}", self.state)
    }
}
