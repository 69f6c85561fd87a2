//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and the state machine vocabulary
//! shared by the rest of the LogHarbor domain.

mod errors;
mod ids;
mod session_state;
mod state_machine;
mod timestamp;

pub use errors::TransitionError;
pub use ids::ViewerId;
pub use session_state::SessionState;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
