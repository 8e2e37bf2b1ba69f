//! Direct-transaction anchoring, used when no registry contract is
//! configured.
//!
//! The anchor is a plain transaction to the zero address whose call data is
//! `"<fingerprint hex>:<content address>"`. The transaction hash doubles as
//! the logical reference.

use std::sync::Arc;

use async_trait::async_trait;
use custody_crypto::SigningKey;
use custody_types::{AnchorRef, ContentAddress, Fingerprint};
use tracing::debug;

use crate::chain::{parse_hash_ref, ChainClient, TxData, ZERO_ADDRESS};
use crate::config::LedgerConfig;
use crate::error::{AnchorError, AnchorResult};
use crate::submitter::Submitter;
use crate::traits::LedgerAnchor;

/// Call data for a direct anchor.
pub fn anchor_payload(fingerprint: &Fingerprint, content_address: &ContentAddress) -> Vec<u8> {
    format!("{}:{}", fingerprint.to_hex(), content_address).into_bytes()
}

/// Anchors with self-describing transactions; returns as soon as the
/// transaction is accepted by the node.
#[derive(Debug)]
pub struct DirectAnchor {
    submitter: Submitter,
}

impl DirectAnchor {
    pub fn new(client: Arc<dyn ChainClient>, key: SigningKey, config: &LedgerConfig) -> Self {
        Self {
            submitter: Submitter::new(client, key, config),
        }
    }

    /// Account the anchoring transactions are sent from.
    pub fn sender(&self) -> &str {
        self.submitter.address()
    }
}

#[async_trait]
impl LedgerAnchor for DirectAnchor {
    async fn anchor(
        &self,
        fingerprint: &Fingerprint,
        content_address: &ContentAddress,
    ) -> AnchorResult<AnchorRef> {
        let data = TxData::Raw(anchor_payload(fingerprint, content_address));
        let tx_hash = self.submitter.send(ZERO_ADDRESS, data).await?;
        Ok(AnchorRef::new(tx_hash.clone(), tx_hash))
    }

    /// Accepts any mined, successful transaction whose payload starts with
    /// the expected fingerprint. This is a prefix match, weaker than the
    /// registry lookup in contract mode.
    async fn verify(&self, logical_ref: &str, expected: &Fingerprint) -> AnchorResult<bool> {
        let tx_hash = parse_hash_ref(logical_ref)?;
        let client = self.submitter.client();

        let (tx, pending) = client.transaction_by_hash(&tx_hash).await?;
        if pending {
            return Err(AnchorError::Pending(tx_hash));
        }
        match client.transaction_receipt(&tx_hash).await? {
            Some(receipt) if receipt.success => {}
            Some(_) => return Err(AnchorError::Reverted(tx_hash)),
            None => return Err(AnchorError::Pending(tx_hash)),
        }

        let data = match &tx.data {
            TxData::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            TxData::RegisterHash { .. } => {
                debug!(tx = %tx_hash, "transaction is a registry call, not a direct anchor");
                return Ok(false);
            }
        };
        Ok(!data.is_empty() && data.starts_with(&expected.to_hex()))
    }

    async fn ping(&self) -> AnchorResult<()> {
        self.submitter.client().block_number().await.map(|_| ())
    }
}
