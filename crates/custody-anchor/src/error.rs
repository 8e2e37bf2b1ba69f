use std::time::Duration;

/// Errors produced by ledger anchoring and verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("malformed ledger input: {0}")]
    Malformed(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("transaction rejected by ledger: {0}")]
    Rejected(String),

    #[error("transaction {0} failed on ledger")]
    Reverted(String),

    #[error("transaction {0} is still pending")]
    Pending(String),

    #[error("transaction {0} not found")]
    NotFound(String),

    #[error("transaction {tx} not mined within {waited:?}")]
    Timeout { tx: String, waited: Duration },
}

impl AnchorError {
    /// Whether the error stems from caller-supplied input rather than the
    /// ledger itself.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Result alias for anchoring operations.
pub type AnchorResult<T> = Result<T, AnchorError>;
