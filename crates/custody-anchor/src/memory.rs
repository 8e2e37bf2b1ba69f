use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use custody_types::Fingerprint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::{ChainClient, SignedTransaction, Transaction, TxData, TxReceipt};
use crate::error::{AnchorError, AnchorResult};

/// Base cost of any transaction.
pub const BASE_GAS: u64 = 21_000;
/// Cost per byte of call data.
pub const GAS_PER_DATA_BYTE: u64 = 16;

/// Simulated ledger for tests, local demos, and embedding.
///
/// Transactions are checked for a valid signature, matching chain id and
/// the sender's next nonce. With auto-mining on (the default) every
/// accepted transaction is mined into its own block immediately; otherwise
/// it stays pending until [`InMemoryChain::mine_pending`]. Registry writes
/// land in a per-contract map that [`ChainClient::query_registry`] reads.
///
/// A chain built with [`InMemoryChain::open`] writes a JSON snapshot of its
/// state after every accepted transaction and every mined block, so a later
/// process can reopen it.
pub struct InMemoryChain {
    chain_id: u64,
    inner: RwLock<ChainState>,
    snapshot: Option<PathBuf>,
    snapshot_lock: tokio::sync::Mutex<()>,
    online: AtomicBool,
    auto_mine: AtomicBool,
    revert_next: AtomicBool,
}

#[derive(Default, Serialize, Deserialize)]
struct ChainState {
    chain_id: u64,
    block_number: u64,
    pending: Vec<String>,
    transactions: HashMap<String, Transaction>,
    receipts: HashMap<String, TxReceipt>,
    nonces: HashMap<String, u64>,
    /// contract -> logical ref -> fingerprint
    registry: HashMap<String, HashMap<String, Fingerprint>>,
}

impl InMemoryChain {
    pub fn new(chain_id: u64) -> Self {
        Self::with_state(
            ChainState {
                chain_id,
                ..ChainState::default()
            },
            None,
        )
    }

    /// Open a chain snapshotted at `path`, restoring its state if the file
    /// exists. A snapshot taken under another chain id is rejected.
    pub fn open(path: impl Into<PathBuf>, chain_id: u64) -> AnchorResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let data = fs::read(&path).map_err(|e| snapshot_error(&path, e))?;
            let state: ChainState =
                serde_json::from_slice(&data).map_err(|e| snapshot_error(&path, e))?;
            if state.chain_id != chain_id {
                return Err(AnchorError::Malformed(format!(
                    "chain snapshot {} belongs to chain {}, not {chain_id}",
                    path.display(),
                    state.chain_id
                )));
            }
            state
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| snapshot_error(&path, e))?;
            }
            ChainState {
                chain_id,
                ..ChainState::default()
            }
        };
        debug!(
            path = %path.display(),
            block = state.block_number,
            transactions = state.transactions.len(),
            "chain snapshot opened"
        );
        Ok(Self::with_state(state, Some(path)))
    }

    fn with_state(state: ChainState, snapshot: Option<PathBuf>) -> Self {
        Self {
            chain_id: state.chain_id,
            inner: RwLock::new(state),
            snapshot,
            snapshot_lock: tokio::sync::Mutex::new(()),
            online: AtomicBool::new(true),
            auto_mine: AtomicBool::new(true),
            revert_next: AtomicBool::new(false),
        }
    }

    /// Path of the state snapshot, if the chain is file-backed.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    /// Simulate the node becoming unreachable (or reachable again).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Toggle mining each transaction on arrival.
    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.auto_mine.store(auto_mine, Ordering::SeqCst);
    }

    /// Make the next mined transaction fail with an unsuccessful receipt.
    pub fn revert_next(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    /// Mine all pending transactions into one block. Returns how many were
    /// included.
    pub async fn mine_pending(&self) -> AnchorResult<usize> {
        let mined = {
            let mut state = self.inner.write().expect("lock poisoned");
            let pending = std::mem::take(&mut state.pending);
            if !pending.is_empty() {
                state.block_number += 1;
                for tx_hash in &pending {
                    self.execute(&mut state, tx_hash);
                }
            }
            pending.len()
        };
        if mined > 0 {
            self.save().await?;
        }
        Ok(mined)
    }

    /// Number of transactions accepted so far, mined or not.
    pub fn transaction_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").transactions.len()
    }

    fn ensure_online(&self) -> AnchorResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AnchorError::Unavailable("in-memory chain is offline".into()))
        }
    }

    /// Write the current state to the snapshot file, if any.
    ///
    /// Snapshots are taken under `snapshot_lock`, so a later write never
    /// carries older state than an earlier one.
    async fn save(&self) -> AnchorResult<()> {
        let Some(path) = self.snapshot.clone() else {
            return Ok(());
        };
        let _guard = self.snapshot_lock.lock().await;
        let data = {
            let state = self.inner.read().expect("lock poisoned");
            serde_json::to_vec(&*state).map_err(|e| snapshot_error(&path, e))?
        };
        tokio::task::spawn_blocking(move || write_snapshot(&path, &data))
            .await
            .map_err(|e| AnchorError::Unavailable(format!("snapshot task failed: {e}")))?
    }

    fn execute(&self, state: &mut ChainState, tx_hash: &str) {
        let Some(tx) = state.transactions.get(tx_hash).cloned() else {
            return;
        };
        let mut success = !self.revert_next.swap(false, Ordering::SeqCst)
            && tx.gas_limit >= intrinsic_gas(&tx);

        if success {
            if let TxData::RegisterHash {
                logical_ref,
                fingerprint,
                ..
            } = &tx.data
            {
                let entries = state.registry.entry(tx.to.clone()).or_default();
                if entries.contains_key(logical_ref) {
                    success = false;
                } else {
                    entries.insert(logical_ref.clone(), *fingerprint);
                }
            }
        }

        debug!(tx = %tx_hash, block = state.block_number, success, "transaction mined");
        state.receipts.insert(
            tx_hash.to_string(),
            TxReceipt {
                tx_hash: tx_hash.to_string(),
                block_number: state.block_number,
                success,
            },
        );
    }
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new(1337)
    }
}

impl std::fmt::Debug for InMemoryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChain")
            .field("chain_id", &self.chain_id)
            .field("transactions", &self.transaction_count())
            .field("online", &self.online.load(Ordering::SeqCst))
            .finish()
    }
}

fn snapshot_error(path: &Path, e: impl std::fmt::Display) -> AnchorError {
    AnchorError::Unavailable(format!("chain snapshot {}: {e}", path.display()))
}

fn write_snapshot(path: &Path, data: &[u8]) -> AnchorResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| snapshot_error(path, e))?;
    tmp.write_all(data).map_err(|e| snapshot_error(path, e))?;
    tmp.as_file().sync_all().map_err(|e| snapshot_error(path, e))?;
    tmp.persist(path).map_err(|e| snapshot_error(path, e.error))?;
    Ok(())
}

/// Gas consumed before any execution: a flat base plus call data.
pub fn intrinsic_gas(tx: &Transaction) -> u64 {
    BASE_GAS + GAS_PER_DATA_BYTE * tx.data.encode().len() as u64
}

#[async_trait]
impl ChainClient for InMemoryChain {
    async fn chain_id(&self) -> AnchorResult<u64> {
        self.ensure_online()?;
        Ok(self.chain_id)
    }

    async fn pending_nonce(&self, address: &str) -> AnchorResult<u64> {
        self.ensure_online()?;
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.nonces.get(address).copied().unwrap_or(0))
    }

    async fn send_transaction(&self, signed: SignedTransaction) -> AnchorResult<String> {
        self.ensure_online()?;
        signed.verify_signature()?;
        if signed.tx.chain_id != self.chain_id {
            return Err(AnchorError::Rejected(format!(
                "chain id {} does not match {}",
                signed.tx.chain_id, self.chain_id
            )));
        }

        let tx_hash = signed.hash();
        {
            let mut state = self.inner.write().expect("lock poisoned");
            let expected = state.nonces.get(&signed.tx.from).copied().unwrap_or(0);
            if signed.tx.nonce != expected {
                return Err(AnchorError::Rejected(format!(
                    "nonce {} for {}, expected {expected}",
                    signed.tx.nonce, signed.tx.from
                )));
            }
            state.nonces.insert(signed.tx.from.clone(), expected + 1);
            state.transactions.insert(tx_hash.clone(), signed.tx);

            if self.auto_mine.load(Ordering::SeqCst) {
                state.block_number += 1;
                self.execute(&mut state, &tx_hash);
            } else {
                state.pending.push(tx_hash.clone());
            }
        }
        self.save().await?;
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: &str) -> AnchorResult<Option<TxReceipt>> {
        self.ensure_online()?;
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.receipts.get(tx_hash).cloned())
    }

    async fn transaction_by_hash(&self, tx_hash: &str) -> AnchorResult<(Transaction, bool)> {
        self.ensure_online()?;
        let state = self.inner.read().expect("lock poisoned");
        let tx = state
            .transactions
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| AnchorError::NotFound(tx_hash.to_string()))?;
        let pending = !state.receipts.contains_key(tx_hash);
        Ok((tx, pending))
    }

    async fn query_registry(
        &self,
        contract: &str,
        logical_ref: &str,
        fingerprint: &Fingerprint,
    ) -> AnchorResult<bool> {
        self.ensure_online()?;
        let state = self.inner.read().expect("lock poisoned");
        let stored = state
            .registry
            .get(contract)
            .and_then(|entries| entries.get(logical_ref));
        Ok(stored == Some(fingerprint))
    }

    async fn block_number(&self) -> AnchorResult<u64> {
        self.ensure_online()?;
        Ok(self.inner.read().expect("lock poisoned").block_number)
    }
}
