//! SessionState enum for the lifecycle of one viewer connection.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::StateMachine;

/// Lifecycle of a viewer session.
///
/// ```text
/// Connecting ──► Active ──► Draining ──► Closed
///      │                                   ▲
///      └───────────────────────────────────┘   (handshake refused)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Connecting,
    Active,
    Draining,
    Closed,
}

impl SessionState {
    /// True while the session is registered and receiving broadcasts.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

impl StateMachine for SessionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Connecting, Active) | (Connecting, Closed) | (Active, Draining) | (Draining, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionState::*;
        match self {
            Connecting => vec![Active, Closed],
            Active => vec![Draining],
            Draining => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "Connecting",
            SessionState::Active => "Active",
            SessionState::Draining => "Draining",
            SessionState::Closed => "Closed",
        };
        write!(f, "{}", s)
    }
}
