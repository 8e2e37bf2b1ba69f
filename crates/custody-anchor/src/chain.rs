//! Ledger RPC seam.
//!
//! [`ChainClient`] is the narrow set of node calls the anchoring adapters
//! need: nonce lookup, broadcast, receipt and transaction lookup, a
//! read-only registry query, and block height. Transactions are signed with
//! Ed25519 over a domain-separated hash of their canonical encoding.

use std::time::Duration;

use async_trait::async_trait;
use custody_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};
use custody_types::{ContentAddress, Fingerprint};
use serde::{Deserialize, Serialize};

use crate::error::{AnchorError, AnchorResult};

/// Destination used by direct-mode anchoring transactions.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Check that `address` is `0x` followed by 40 hex digits.
pub fn parse_address(address: &str) -> AnchorResult<String> {
    let digits = address
        .strip_prefix("0x")
        .ok_or_else(|| AnchorError::Malformed(format!("address {address:?} lacks 0x prefix")))?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AnchorError::Malformed(format!(
            "address {address:?} must be 0x followed by 40 hex digits"
        )));
    }
    Ok(format!("0x{}", digits.to_lowercase()))
}

/// Check that `reference` is a 32-byte hash rendered as `0x` + 64 hex.
pub fn parse_hash_ref(reference: &str) -> AnchorResult<String> {
    let digits = reference.strip_prefix("0x").unwrap_or(reference);
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AnchorError::Malformed(format!(
            "reference {reference:?} must be a 32-byte hex hash"
        )));
    }
    Ok(format!("0x{}", digits.to_lowercase()))
}

/// Call data carried by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxData {
    /// Opaque bytes with no contract semantics.
    Raw(Vec<u8>),
    /// Registry contract write: store `fingerprint` under `logical_ref`.
    RegisterHash {
        logical_ref: String,
        fingerprint: Fingerprint,
        content_address: ContentAddress,
    },
}

impl TxData {
    /// Canonical byte encoding, also the basis for intrinsic gas.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Raw(bytes) => bytes.clone(),
            Self::RegisterHash {
                logical_ref,
                fingerprint,
                content_address,
            } => {
                let mut out = Vec::with_capacity(128);
                push_framed(&mut out, logical_ref.as_bytes());
                out.extend_from_slice(fingerprint.as_bytes());
                push_framed(&mut out, content_address.as_str().as_bytes());
                out
            }
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Raw(_) => 0,
            Self::RegisterHash { .. } => 1,
        }
    }
}

/// An unsigned ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    pub gas_limit: u64,
    pub data: TxData,
}

impl Transaction {
    /// Domain-separated hash the signature commits to.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut body = Vec::with_capacity(256);
        body.extend_from_slice(&self.nonce.to_be_bytes());
        body.extend_from_slice(&self.chain_id.to_be_bytes());
        body.extend_from_slice(&self.gas_limit.to_be_bytes());
        push_framed(&mut body, self.from.as_bytes());
        push_framed(&mut body, self.to.as_bytes());
        body.push(self.data.tag());
        push_framed(&mut body, &self.data.encode());
        ContentHasher::TRANSACTION.hash(&body)
    }

    /// Sign with `key`, binding the signer's public key into the envelope.
    pub fn sign(self, key: &SigningKey) -> SignedTransaction {
        let signature = key.sign(&self.signing_hash());
        SignedTransaction {
            public_key: key.verifying_key().as_bytes(),
            signature,
            tx: self,
        }
    }
}

/// A transaction together with its signer and signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub public_key: [u8; 32],
    pub signature: Signature,
}

impl SignedTransaction {
    /// Ledger-native transaction id: `0x` + 64 hex.
    pub fn hash(&self) -> String {
        format!("0x{}", hex::encode(self.tx.signing_hash()))
    }

    /// Check the signature and that `from` is the signer's address.
    pub fn verify_signature(&self) -> AnchorResult<()> {
        let key = VerifyingKey::from_bytes(self.public_key)
            .map_err(|e| AnchorError::Rejected(e.to_string()))?;
        key.verify(&self.tx.signing_hash(), &self.signature)
            .map_err(|e| AnchorError::Rejected(e.to_string()))?;
        if key.address() != self.tx.from {
            return Err(AnchorError::Rejected(format!(
                "sender {} does not match signing key {}",
                self.tx.from,
                key.address()
            )));
        }
        Ok(())
    }
}

/// Outcome of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub success: bool,
}

/// Node RPC surface used by the anchoring adapters.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id transactions must be signed for.
    async fn chain_id(&self) -> AnchorResult<u64>;

    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce(&self, address: &str) -> AnchorResult<u64>;

    /// Broadcast a signed transaction; returns its hash.
    async fn send_transaction(&self, tx: SignedTransaction) -> AnchorResult<String>;

    /// Receipt for a mined transaction, `None` while pending or unknown.
    async fn transaction_receipt(&self, tx_hash: &str) -> AnchorResult<Option<TxReceipt>>;

    /// The transaction and whether it is still pending.
    async fn transaction_by_hash(&self, tx_hash: &str) -> AnchorResult<(Transaction, bool)>;

    /// Read-only registry call: does `contract` hold `fingerprint` under
    /// `logical_ref`?
    async fn query_registry(
        &self,
        contract: &str,
        logical_ref: &str,
        fingerprint: &Fingerprint,
    ) -> AnchorResult<bool>;

    /// Current block height.
    async fn block_number(&self) -> AnchorResult<u64>;
}

/// Poll for a receipt until the transaction is mined or `timeout` expires.
pub async fn wait_mined(
    client: &dyn ChainClient,
    tx_hash: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> AnchorResult<TxReceipt> {
    let poll = async {
        loop {
            if let Some(receipt) = client.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(poll_interval).await;
        }
    };
    match tokio::time::timeout(timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(AnchorError::Timeout {
            tx: tx_hash.to_string(),
            waited: timeout,
        }),
    }
}

fn push_framed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    out.extend_from_slice(bytes);
}
