//! Error taxonomy for the action surface.
//!
//! Every exploration, inventory, combat, quest, and persistence action
//! returns one of these categories; callers can match on the variant and
//! display the message. Combat sessions never crash on these — they
//! report and continue.

use thiserror::Error;

/// Typed action failure, distinguishable by category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Malformed parameters: bad time scale, unknown direction,
    /// ambiguous target.
    #[error("{0}")]
    InvalidArgument(String),
    /// Gating violation: examine before inspect, action outside the
    /// allowed phase, out of stamina, empty clip.
    #[error("{0}")]
    PreconditionFailed(String),
    /// Unknown id: enemy, item, quest, save slot.
    #[error("{0}")]
    NotFound(String),
    /// Conflicting state: already-active session, save from a newer
    /// engine version.
    #[error("{0}")]
    ConflictState(String),
    /// Oracle reply failed structural validation.
    #[error("{0}")]
    SchemaInvalid(String),
    /// Oracle reply failed semantic validation against game state.
    #[error("{0}")]
    SemanticInvalid(String),
    /// Transport failure or timeout talking to an external backend.
    #[error("{0}")]
    Transient(String),
}

impl ActionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConflictState(msg.into())
    }
}
