use super::event::SelectionEvent;
use super::model::SelectionState;
use thiserror::Error;

pub type StateResult<T> = std::result::Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid selection transition: from {from:?} using event {event:?}")]
    InvalidStateTransition {
        from: SelectionState,
        event: SelectionEvent,
    },
}
