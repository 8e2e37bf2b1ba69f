use std::sync::Arc;
use std::time::Duration;

use custody_crypto::SigningKey;
use tokio::sync::Mutex;
use tracing::debug;

use crate::chain::{wait_mined, ChainClient, Transaction, TxData, TxReceipt};
use crate::config::LedgerConfig;
use crate::error::{AnchorError, AnchorResult};

/// Signs and broadcasts transactions from one account.
///
/// Nonce lookup and broadcast happen under a lock so concurrent anchors
/// from the same account never reuse a nonce. Waiting for a receipt does
/// not hold the lock.
pub(crate) struct Submitter {
    client: Arc<dyn ChainClient>,
    key: SigningKey,
    address: String,
    gas_limit: u64,
    confirm_timeout: Duration,
    poll_interval: Duration,
    nonce_lock: Mutex<()>,
}

impl Submitter {
    pub(crate) fn new(client: Arc<dyn ChainClient>, key: SigningKey, config: &LedgerConfig) -> Self {
        let address = key.verifying_key().address();
        Self {
            client,
            key,
            address,
            gas_limit: config.gas_limit,
            confirm_timeout: Duration::from_millis(config.confirm_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            nonce_lock: Mutex::new(()),
        }
    }

    pub(crate) fn client(&self) -> &dyn ChainClient {
        self.client.as_ref()
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    /// Sign and broadcast a transaction to `to`; returns its hash.
    pub(crate) async fn send(&self, to: &str, data: TxData) -> AnchorResult<String> {
        let chain_id = self.client.chain_id().await?;
        let _guard = self.nonce_lock.lock().await;
        let nonce = self.client.pending_nonce(&self.address).await?;
        let tx = Transaction {
            nonce,
            chain_id,
            from: self.address.clone(),
            to: to.to_string(),
            gas_limit: self.gas_limit,
            data,
        };
        let signed = tx.sign(&self.key);
        let tx_hash = self.client.send_transaction(signed).await?;
        debug!(tx = %tx_hash, nonce, to, "transaction broadcast");
        Ok(tx_hash)
    }

    /// Broadcast and wait for a successful receipt.
    pub(crate) async fn send_and_confirm(&self, to: &str, data: TxData) -> AnchorResult<TxReceipt> {
        let tx_hash = self.send(to, data).await?;
        let receipt = wait_mined(
            self.client.as_ref(),
            &tx_hash,
            self.confirm_timeout,
            self.poll_interval,
        )
        .await?;
        if !receipt.success {
            return Err(AnchorError::Reverted(tx_hash));
        }
        Ok(receipt)
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("address", &self.address)
            .field("gas_limit", &self.gas_limit)
            .finish()
    }
}
