use custody_types::ContentAddress;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// No content is stored under the address.
    #[error("content not found: {0}")]
    NotFound(ContentAddress),

    /// The address is not one this store could have produced.
    #[error("invalid content address: {0}")]
    InvalidAddress(String),

    /// Stored bytes no longer hash to their address.
    #[error("corrupt content {address}: {reason}")]
    Corrupt {
        address: ContentAddress,
        reason: String,
    },

    /// The backend cannot be reached.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for content store operations.
pub type ContentResult<T> = Result<T, ContentError>;
