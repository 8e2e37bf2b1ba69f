use std::fmt;
use std::time::Duration;

use custody_anchor::AnchorError;
use custody_content::ContentError;
use custody_meta::MetaError;

/// One rejected request field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Errors surfaced by the custody service.
#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    /// Malformed, missing or out-of-enumeration input. Never retried.
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    /// No record for the given id or product.
    #[error("not found: {0}")]
    NotFound(String),

    /// A content, metadata or ledger adapter could not be reached.
    #[error("{service} unavailable: {reason}")]
    Upstream { service: &'static str, reason: String },

    /// The synchronous intake path exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// An adapter answered in a way the service cannot interpret.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CustodyError {
    pub fn upstream(service: &'static str, reason: impl fmt::Display) -> Self {
        Self::Upstream {
            service,
            reason: reason.to_string(),
        }
    }

    /// Whether the failure is an unreachable or slow substrate.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::Validation(v) => v,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ContentError> for CustodyError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(address) => Self::NotFound(format!("content {address}")),
            other => Self::upstream("content store", other),
        }
    }
}

impl From<MetaError> for CustodyError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::NotFound(id) => Self::NotFound(format!("record {id}")),
            e @ (MetaError::AlreadyExists(_)
            | MetaError::InvalidTransition { .. }
            | MetaError::AnchorRequired(_)
            | MetaError::Inconsistent { .. }) => Self::Internal(e.to_string()),
            other => Self::upstream("metadata store", other),
        }
    }
}

impl From<AnchorError> for CustodyError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::Malformed(reason) => {
                Self::Validation(vec![FieldViolation::new("ledger", reason)])
            }
            AnchorError::NotFound(tx) => Self::NotFound(format!("transaction {tx}")),
            other => Self::upstream("ledger", other),
        }
    }
}

/// Result alias for service operations.
pub type CustodyResult<T> = Result<T, CustodyError>;
