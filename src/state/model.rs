use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Dragging,
    Committed,
    Cancelled,
}

impl SelectionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Cancelled)
    }
}

/// Pointer positions of the drag in progress, in global coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionSession {
    pub start: Point,
    pub end: Point,
    pub dragging: bool,
}

impl SelectionSession {
    pub const fn anchored_at(point: Point) -> Self {
        Self {
            start: point,
            end: point,
            dragging: true,
        }
    }
}
