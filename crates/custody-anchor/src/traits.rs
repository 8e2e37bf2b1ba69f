use async_trait::async_trait;
use custody_types::{AnchorRef, ContentAddress, Fingerprint};

use crate::error::AnchorResult;

/// Registers fingerprints on a ledger and checks them back.
#[async_trait]
pub trait LedgerAnchor: Send + Sync {
    /// Anchor `fingerprint` together with the payload's content address.
    ///
    /// Returns the logical reference the anchor can be recovered under and
    /// the ledger-native transaction id.
    async fn anchor(
        &self,
        fingerprint: &Fingerprint,
        content_address: &ContentAddress,
    ) -> AnchorResult<AnchorRef>;

    /// Check that the ledger holds `expected` under `logical_ref`.
    async fn verify(&self, logical_ref: &str, expected: &Fingerprint) -> AnchorResult<bool>;

    /// Check the ledger is reachable.
    async fn ping(&self) -> AnchorResult<()>;
}
