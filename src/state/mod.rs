pub mod error;
pub mod event;
pub mod machine;
pub mod model;

pub use error::{StateError, StateResult};
pub use event::{PointerButton, SelectionEvent, StateTransition};
pub use machine::{SelectionMachine, SelectionOutcome};
pub use model::{SelectionSession, SelectionState};
