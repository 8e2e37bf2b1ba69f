//! Contract-mediated anchoring.
//!
//! Each anchor is a `RegisterHash` call on a registry contract, keyed by a
//! logical reference derived from the fingerprint and content address.
//! Verification is a read-only registry query.

use std::sync::Arc;

use async_trait::async_trait;
use custody_crypto::{ContentHasher, SigningKey};
use custody_types::{AnchorRef, ContentAddress, Fingerprint};
use tracing::debug;

use crate::chain::{parse_address, parse_hash_ref, ChainClient, TxData};
use crate::config::LedgerConfig;
use crate::error::AnchorResult;
use crate::submitter::Submitter;
use crate::traits::LedgerAnchor;

/// Derive the registry key for an anchor: `0x` + 64 hex.
pub fn logical_ref(fingerprint: &Fingerprint, content_address: &ContentAddress) -> String {
    let digest = ContentHasher::ANCHOR_REF.hash_parts(&[
        fingerprint.to_hex().as_bytes(),
        content_address.as_str().as_bytes(),
    ]);
    format!("0x{}", hex::encode(digest))
}

/// Anchors through a registry contract and waits for each write to be mined.
#[derive(Debug)]
pub struct ContractAnchor {
    contract: String,
    submitter: Submitter,
}

impl ContractAnchor {
    pub fn new(
        contract: &str,
        client: Arc<dyn ChainClient>,
        key: SigningKey,
        config: &LedgerConfig,
    ) -> AnchorResult<Self> {
        Ok(Self {
            contract: parse_address(contract)?,
            submitter: Submitter::new(client, key, config),
        })
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Account the anchoring transactions are sent from.
    pub fn sender(&self) -> &str {
        self.submitter.address()
    }
}

#[async_trait]
impl LedgerAnchor for ContractAnchor {
    async fn anchor(
        &self,
        fingerprint: &Fingerprint,
        content_address: &ContentAddress,
    ) -> AnchorResult<AnchorRef> {
        let logical = logical_ref(fingerprint, content_address);
        let data = TxData::RegisterHash {
            logical_ref: logical.clone(),
            fingerprint: *fingerprint,
            content_address: content_address.clone(),
        };
        let receipt = self.submitter.send_and_confirm(&self.contract, data).await?;
        debug!(
            logical_ref = %logical,
            tx = %receipt.tx_hash,
            block = receipt.block_number,
            "registry write mined"
        );
        Ok(AnchorRef::new(logical, receipt.tx_hash))
    }

    async fn verify(&self, logical_ref: &str, expected: &Fingerprint) -> AnchorResult<bool> {
        let key = parse_hash_ref(logical_ref)?;
        self.submitter
            .client()
            .query_registry(&self.contract, &key, expected)
            .await
    }

    async fn ping(&self) -> AnchorResult<()> {
        self.submitter.client().block_number().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnchorError;
    use crate::memory::InMemoryChain;

    const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn setup() -> (Arc<InMemoryChain>, ContractAnchor) {
        let chain = Arc::new(InMemoryChain::default());
        let config = LedgerConfig {
            confirm_timeout_ms: 200,
            poll_interval_ms: 5,
            ..LedgerConfig::default()
        };
        let anchor =
            ContractAnchor::new(CONTRACT, chain.clone(), SigningKey::generate(), &config).unwrap();
        (chain, anchor)
    }

    fn fixture() -> (Fingerprint, ContentAddress) {
        (
            Fingerprint::from_hash([0x42; 32]),
            ContentAddress::new("b3aaaa"),
        )
    }

    #[test]
    fn logical_ref_is_stable_and_binds_both_inputs() {
        let (fp, cid) = fixture();
        let a = logical_ref(&fp, &cid);
        assert_eq!(a, logical_ref(&fp, &cid));
        assert_eq!(a.len(), 66);
        assert_ne!(a, logical_ref(&fp, &ContentAddress::new("b3bbbb")));
        assert_ne!(a, logical_ref(&Fingerprint::from_hash([1; 32]), &cid));
    }

    #[tokio::test]
    async fn anchor_then_verify() {
        let (_, anchor) = setup();
        let (fp, cid) = fixture();
        let r = anchor.anchor(&fp, &cid).await.unwrap();
        assert!(r.is_complete());
        assert_eq!(r.logical_ref, logical_ref(&fp, &cid));
        assert_ne!(r.logical_ref, r.native_tx_ref);

        assert!(anchor.verify(&r.logical_ref, &fp).await.unwrap());
        assert!(!anchor
            .verify(&r.logical_ref, &Fingerprint::from_hash([0; 32]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reverted_write_fails_anchor() {
        let (chain, anchor) = setup();
        chain.revert_next();
        let (fp, cid) = fixture();
        assert!(matches!(
            anchor.anchor(&fp, &cid).await,
            Err(AnchorError::Reverted(_))
        ));
        assert!(!anchor.verify(&logical_ref(&fp, &cid), &fp).await.unwrap());
    }

    #[tokio::test]
    async fn unmined_write_times_out() {
        let (chain, anchor) = setup();
        chain.set_auto_mine(false);
        let (fp, cid) = fixture();
        assert!(matches!(
            anchor.anchor(&fp, &cid).await,
            Err(AnchorError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_reference_is_validation_error() {
        let (_, anchor) = setup();
        let (fp, _) = fixture();
        let err = anchor.verify("not-a-ref", &fp).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn offline_ledger_is_unavailable() {
        let (chain, anchor) = setup();
        chain.set_online(false);
        let (fp, cid) = fixture();
        assert!(matches!(
            anchor.anchor(&fp, &cid).await,
            Err(AnchorError::Unavailable(_))
        ));
        assert!(anchor.ping().await.is_err());
    }

    #[test]
    fn rejects_malformed_contract_address() {
        let chain = Arc::new(InMemoryChain::default());
        assert!(ContractAnchor::new(
            "0xnope",
            chain,
            SigningKey::generate(),
            &LedgerConfig::default()
        )
        .is_err());
    }
}
