//! Error types for metadata store operations.

use custody_types::{AnchorState, EventId};
use thiserror::Error;

/// Errors that can occur during metadata store operations.
#[derive(Debug, Error)]
pub enum MetaError {
    /// No record exists for the id.
    #[error("record not found: {0}")]
    NotFound(EventId),

    /// A record with this id is already stored.
    #[error("record already exists: {0}")]
    AlreadyExists(EventId),

    /// The lifecycle does not allow the requested state change.
    #[error("invalid state transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: EventId,
        from: AnchorState,
        to: AnchorState,
    },

    /// Confirmation must go through `update_anchor` so references are set.
    #[error("record {0} cannot be confirmed without anchor references")]
    AnchorRequired(EventId),

    /// The record violates a structural invariant.
    #[error("inconsistent record {id}: {reason}")]
    Inconsistent { id: EventId, reason: String },

    /// The backend cannot be reached.
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetaError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience type alias for metadata store operations.
pub type MetaResult<T> = std::result::Result<T, MetaError>;
