use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use custody_anchor::{Anchor, ChainClient, LedgerAnchor};
use custody_content::{ContentStore, FsContentStore, InMemoryContentStore};
use custody_crypto::compute_fingerprint;
use custody_meta::{FileMetadataStore, InMemoryMetadataStore, MetadataStore};
use custody_types::{
    AnchorState, AnchorStatus, EventId, EventRecord, EventType, FingerprintInput,
    RegisterRequest, VerificationResult,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::anchoring::{AnchorDispatcher, AnchorTask, SpawnDispatcher};
use crate::config::{ContentBackend, CustodyConfig, MetadataBackend};
use crate::error::{CustodyError, CustodyResult};
use crate::validation::validate_request;

/// Message of a verification that stopped because the record has no anchor.
pub const NOT_YET_ANCHORED: &str = "not yet anchored";

/// Reachability of one substrate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubstrateHealth {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubstrateHealth {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                healthy: true,
                error: None,
            },
            Err(e) => Self {
                healthy: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Reachability of all three substrates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub content: SubstrateHealth,
    pub metadata: SubstrateHealth,
    pub ledger: SubstrateHealth,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.content.healthy && self.metadata.healthy && self.ledger.healthy
    }
}

/// Event intake, anchoring orchestration and integrity verification.
///
/// Holds only adapter handles; cloning is cheap and clones share them.
#[derive(Clone)]
pub struct CustodyService {
    content: Arc<dyn ContentStore>,
    meta: Arc<dyn MetadataStore>,
    ledger: Arc<dyn LedgerAnchor>,
    dispatcher: Arc<dyn AnchorDispatcher>,
    register_timeout: Duration,
}

impl CustodyService {
    /// Assemble a service that anchors through a [`SpawnDispatcher`].
    pub fn new(
        content: Arc<dyn ContentStore>,
        meta: Arc<dyn MetadataStore>,
        ledger: Arc<dyn LedgerAnchor>,
        register_timeout: Duration,
    ) -> Self {
        let dispatcher = Arc::new(SpawnDispatcher::new(ledger.clone(), meta.clone()));
        Self::with_dispatcher(content, meta, ledger, dispatcher, register_timeout)
    }

    pub fn with_dispatcher(
        content: Arc<dyn ContentStore>,
        meta: Arc<dyn MetadataStore>,
        ledger: Arc<dyn LedgerAnchor>,
        dispatcher: Arc<dyn AnchorDispatcher>,
        register_timeout: Duration,
    ) -> Self {
        Self {
            content,
            meta,
            ledger,
            dispatcher,
            register_timeout,
        }
    }

    /// Build every adapter named by `config` on top of the given ledger node.
    pub fn from_config(config: &CustodyConfig, chain: Arc<dyn ChainClient>) -> CustodyResult<Self> {
        config.validate()?;

        let content: Arc<dyn ContentStore> = match config.content.backend {
            ContentBackend::Memory => Arc::new(InMemoryContentStore::new()),
            ContentBackend::Fs => Arc::new(FsContentStore::open(&config.content.root)?),
        };
        let meta: Arc<dyn MetadataStore> = match config.metadata.backend {
            MetadataBackend::Memory => Arc::new(InMemoryMetadataStore::new()),
            MetadataBackend::File => Arc::new(FileMetadataStore::open(&config.metadata.path)?),
        };
        let ledger = Anchor::from_config(&config.ledger, chain)
            .map_err(|e| CustodyError::Config(format!("ledger: {e}")))?;

        Ok(Self::new(
            content,
            meta,
            Arc::new(ledger),
            config.register_timeout(),
        ))
    }

    /// Register a custody event.
    ///
    /// Validation, the content write, fingerprinting and the metadata write
    /// run under the configured deadline. Anchoring is dispatched after the
    /// record is persisted and is not awaited; the returned record is
    /// always `pending`.
    pub async fn register(&self, request: RegisterRequest) -> CustodyResult<EventRecord> {
        let event_type = validate_request(&request)?;

        let record = tokio::time::timeout(self.register_timeout, self.persist(event_type, request))
            .await
            .map_err(|_| CustodyError::Timeout(self.register_timeout))??;

        self.dispatcher.dispatch(AnchorTask::from(&record));
        info!(
            id = %record.id,
            product = %record.product_id,
            event_type = %record.event_type,
            fingerprint = %record.fingerprint.short_hex(),
            "event registered"
        );
        Ok(record)
    }

    async fn persist(
        &self,
        event_type: EventType,
        request: RegisterRequest,
    ) -> CustodyResult<EventRecord> {
        let id = EventId::new();
        let now = Utc::now();

        let content_address = self.content.put(request.payload.as_bytes()).await?;
        debug!(%id, %content_address, "payload stored");

        let fingerprint = compute_fingerprint(&FingerprintInput {
            id: &id,
            event_type,
            product_id: &request.product_id,
            event_time: &now,
            payload: &request.payload,
        });

        let record = EventRecord {
            id,
            event_type,
            product_id: request.product_id,
            event_time: now,
            payload: request.payload,
            fingerprint,
            anchor: None,
            content_address,
            actor: request.actor,
            state: AnchorState::Pending,
            created_at: now,
            updated_at: now,
        };
        self.meta.put(&record).await?;
        Ok(record)
    }

    pub async fn get_by_id(&self, id: &EventId) -> CustodyResult<EventRecord> {
        Ok(self.meta.get_by_id(id).await?)
    }

    /// Records of one product in stored order.
    pub async fn list_by_product(&self, product_id: &str) -> CustodyResult<Vec<EventRecord>> {
        Ok(self.meta.scan_by_product(product_id).await?)
    }

    pub async fn list_all(&self, limit: Option<usize>) -> CustodyResult<Vec<EventRecord>> {
        Ok(self.meta.scan_all(limit).await?)
    }

    pub async fn anchor_status(&self, id: &EventId) -> CustodyResult<AnchorStatus> {
        let record = self.meta.get_by_id(id).await?;
        Ok(AnchorStatus::from(&record))
    }

    /// Re-check a record against the ledger and the content store.
    ///
    /// Only a missing record is an error. Adapter failures and mismatches
    /// produce an unverified result whose message says what went wrong.
    pub async fn verify_integrity(&self, id: &EventId) -> CustodyResult<VerificationResult> {
        let record = self.meta.get_by_id(id).await?;
        if !record.is_anchored() {
            return Ok(VerificationResult::unverified(record.id, NOT_YET_ANCHORED));
        }

        let local = compute_fingerprint(&record.fingerprint_input());
        let mut result = VerificationResult::unverified(record.id, "");
        result.local_fingerprint = local.to_hex();

        let ledger_ok = match self.ledger.verify(record.anchor_ref(), &local).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(id = %record.id, error = %e, "ledger verification failed");
                result.message = format!("ledger verification failed: {e}");
                return Ok(result);
            }
        };
        if ledger_ok {
            result.ledger_fingerprint = record.fingerprint.to_hex();
        }

        let fetched = match self.content.get(&record.content_address).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id = %record.id, error = %e, "content retrieval failed");
                result.message = format!("content retrieval failed: {e}");
                return Ok(result);
            }
        };

        result.content_match = fetched == record.payload.as_bytes();
        result.verified = ledger_ok && result.content_match;
        result.message = if result.verified {
            "verified".to_string()
        } else {
            let mut discrepancies = Vec::new();
            if !ledger_ok {
                discrepancies.push("ledger does not hold the recomputed fingerprint");
            }
            if !result.content_match {
                discrepancies.push("content store payload differs from the record");
            }
            warn!(id = %record.id, ?discrepancies, "integrity discrepancy");
            format!("discrepancy detected: {}", discrepancies.join("; "))
        };
        Ok(result)
    }

    /// Wait for every anchoring task dispatched by this service to settle.
    pub async fn drain(&self) {
        self.dispatcher.drain().await;
    }

    /// Ping the content store, metadata store and ledger concurrently.
    pub async fn health(&self) -> HealthReport {
        let (content, metadata, ledger) =
            tokio::join!(self.content.ping(), self.meta.ping(), self.ledger.ping());
        HealthReport {
            content: SubstrateHealth::from_result(content),
            metadata: SubstrateHealth::from_result(metadata),
            ledger: SubstrateHealth::from_result(ledger),
        }
    }
}

impl std::fmt::Debug for CustodyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyService")
            .field("register_timeout", &self.register_timeout)
            .finish_non_exhaustive()
    }
}
