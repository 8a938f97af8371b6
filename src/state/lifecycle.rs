/// Lifecycle of a traversal strategy
///
/// This module defines the states a strategy moves through and which moves are legal.
use std::fmt;

/// Represents the current state of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalState {
    /// Created but not started
    Idle,

    /// Fragments are being fetched and members extracted
    Running,

    /// No work is left; buffered members are being flushed
    Draining,

    /// Waiting for the poll timer before refetching mutable fragments
    Polling,

    /// Output closed or traversal cancelled; terminal
    Closed,
}

impl TraversalState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true if fragments may currently be dispatched
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Draining)
    }

    /// Returns true if moving to `next` is a legal transition
    ///
    /// Closing is always allowed, which is how cancellation works from any state.
    pub fn can_transition_to(&self, next: TraversalState) -> bool {
        use TraversalState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Running) => true,
            (Running, Draining) | (Running, Polling) => true,
            (Draining, Polling) | (Draining, Running) => true,
            (Polling, Running) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Polling => "polling",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
