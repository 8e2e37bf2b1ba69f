use std::sync::Arc;

use async_trait::async_trait;
use custody_crypto::SigningKey;
use custody_types::{AnchorRef, ContentAddress, Fingerprint};
use tracing::{info, warn};

use crate::chain::ChainClient;
use crate::config::LedgerConfig;
use crate::contract::ContractAnchor;
use crate::direct::DirectAnchor;
use crate::error::{AnchorError, AnchorResult};
use crate::traits::LedgerAnchor;

/// The configured anchoring strategy.
///
/// Chosen once by [`Anchor::from_config`]; callers only see
/// [`LedgerAnchor`].
#[derive(Debug)]
pub enum Anchor {
    Contract(ContractAnchor),
    Direct(DirectAnchor),
}

impl Anchor {
    /// Build the adapter selected by `config` on top of `client`.
    pub fn from_config(config: &LedgerConfig, client: Arc<dyn ChainClient>) -> AnchorResult<Self> {
        config.validate()?;
        let key = match &config.signing_key {
            Some(hex) => {
                SigningKey::from_hex(hex).map_err(|e| AnchorError::Signing(e.to_string()))?
            }
            None => {
                warn!("no ledger signing key configured, using an ephemeral key");
                SigningKey::generate()
            }
        };

        let anchor = match &config.contract_address {
            Some(contract) => Self::Contract(ContractAnchor::new(contract, client, key, config)?),
            None => Self::Direct(DirectAnchor::new(client, key, config)),
        };
        info!(mode = anchor.mode(), sender = anchor.sender(), "ledger anchor ready");
        Ok(anchor)
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Contract(_) => "contract",
            Self::Direct(_) => "direct",
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Self::Contract(a) => a.sender(),
            Self::Direct(a) => a.sender(),
        }
    }
}

#[async_trait]
impl LedgerAnchor for Anchor {
    async fn anchor(
        &self,
        fingerprint: &Fingerprint,
        content_address: &ContentAddress,
    ) -> AnchorResult<AnchorRef> {
        match self {
            Self::Contract(a) => a.anchor(fingerprint, content_address).await,
            Self::Direct(a) => a.anchor(fingerprint, content_address).await,
        }
    }

    async fn verify(&self, logical_ref: &str, expected: &Fingerprint) -> AnchorResult<bool> {
        match self {
            Self::Contract(a) => a.verify(logical_ref, expected).await,
            Self::Direct(a) => a.verify(logical_ref, expected).await,
        }
    }

    async fn ping(&self) -> AnchorResult<()> {
        match self {
            Self::Contract(a) => a.ping().await,
            Self::Direct(a) => a.ping().await,
        }
    }
}
