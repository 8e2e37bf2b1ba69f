//! Detached anchoring.
//!
//! Once a record is persisted, its fingerprint is anchored on the ledger in
//! the background. Each attempt is made exactly once: success confirms the
//! record with both ledger references, failure marks it failed. Neither
//! outcome is reported to the original caller; it is observable only by
//! reading the record again.

use std::sync::Arc;

use async_trait::async_trait;
use custody_anchor::LedgerAnchor;
use custody_meta::MetadataStore;
use custody_types::{AnchorState, ContentAddress, EventId, EventRecord, Fingerprint};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Work item for one anchoring attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorTask {
    pub id: EventId,
    pub fingerprint: Fingerprint,
    pub content_address: ContentAddress,
}

impl From<&EventRecord> for AnchorTask {
    fn from(record: &EventRecord) -> Self {
        Self {
            id: record.id,
            fingerprint: record.fingerprint,
            content_address: record.content_address.clone(),
        }
    }
}

/// How settled anchoring attempts end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnchorOutcome {
    Confirmed,
    Failed(String),
    /// The ledger call settled but the follow-up metadata write did not.
    Unrecorded(String),
}

/// Hands anchoring work off without blocking the caller.
#[async_trait]
pub trait AnchorDispatcher: Send + Sync {
    fn dispatch(&self, task: AnchorTask);

    /// Wait until every task dispatched so far has settled.
    async fn drain(&self) {}
}

/// Runs one unsupervised tokio task per record.
///
/// Tasks are independent of the request that dispatched them: dropping
/// or cancelling the caller does not cancel the anchor. A process about to
/// exit calls [`AnchorDispatcher::drain`] so the runtime is not shut down
/// under them.
#[derive(Clone)]
pub struct SpawnDispatcher {
    ledger: Arc<dyn LedgerAnchor>,
    meta: Arc<dyn MetadataStore>,
    in_flight: Arc<watch::Sender<usize>>,
}

impl SpawnDispatcher {
    pub fn new(ledger: Arc<dyn LedgerAnchor>, meta: Arc<dyn MetadataStore>) -> Self {
        Self {
            ledger,
            meta,
            in_flight: Arc::new(watch::Sender::new(0)),
        }
    }

    /// Number of dispatched tasks that have not settled yet.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }
}

#[async_trait]
impl AnchorDispatcher for SpawnDispatcher {
    fn dispatch(&self, task: AnchorTask) {
        let ledger = self.ledger.clone();
        let meta = self.meta.clone();
        let in_flight = self.in_flight.clone();
        in_flight.send_modify(|n| *n += 1);
        let guard = InFlightGuard(in_flight);
        tokio::spawn(async move {
            let _guard = guard;
            run_anchor_task(ledger.as_ref(), meta.as_ref(), &task).await;
        });
    }

    async fn drain(&self) {
        let mut rx = self.in_flight.subscribe();
        let pending = *rx.borrow();
        if pending > 0 {
            debug!(pending, "waiting for anchor tasks");
        }
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Decrements the in-flight count when a task ends, however it ends.
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n -= 1);
    }
}

impl std::fmt::Debug for SpawnDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnDispatcher").finish_non_exhaustive()
    }
}

/// Make a single anchoring attempt and record its result.
pub async fn run_anchor_task(
    ledger: &dyn LedgerAnchor,
    meta: &dyn MetadataStore,
    task: &AnchorTask,
) -> AnchorOutcome {
    match ledger.anchor(&task.fingerprint, &task.content_address).await {
        Ok(anchor) => match meta.update_anchor(&task.id, &anchor).await {
            Ok(()) => {
                info!(
                    id = %task.id,
                    logical_ref = %anchor.logical_ref,
                    tx = %anchor.native_tx_ref,
                    "event anchored"
                );
                AnchorOutcome::Confirmed
            }
            Err(e) => {
                error!(
                    id = %task.id,
                    tx = %anchor.native_tx_ref,
                    error = %e,
                    "anchor succeeded but record could not be confirmed"
                );
                AnchorOutcome::Unrecorded(e.to_string())
            }
        },
        Err(anchor_err) => {
            warn!(id = %task.id, error = %anchor_err, "anchoring failed");
            match meta.update_state(&task.id, AnchorState::Failed).await {
                Ok(()) => AnchorOutcome::Failed(anchor_err.to_string()),
                Err(e) => {
                    error!(
                        id = %task.id,
                        error = %e,
                        "anchoring failed and record could not be marked failed"
                    );
                    AnchorOutcome::Unrecorded(e.to_string())
                }
            }
        }
    }
}
