use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use custody_anchor::{Anchor, InMemoryChain, LedgerConfig};
use custody_content::InMemoryContentStore;
use custody_core::{
    ChainViolationKind, ContentBackend, CustodyConfig, CustodyError, CustodyService,
    MetadataBackend, Oracle, OracleConfig, ViewStatus,
};
use custody_meta::{InMemoryMetadataStore, MetadataStore};
use custody_types::{AnchorState, EventRecord, RegisterRequest};

struct Harness {
    service: CustodyService,
    content: Arc<InMemoryContentStore>,
    meta: Arc<InMemoryMetadataStore>,
    chain: Arc<InMemoryChain>,
}

fn harness(contract: Option<&str>) -> Harness {
    let content = Arc::new(InMemoryContentStore::new());
    let meta = Arc::new(InMemoryMetadataStore::new());
    let chain = Arc::new(InMemoryChain::default());
    let config = LedgerConfig {
        contract_address: contract.map(str::to_string),
        confirm_timeout_ms: 2_000,
        poll_interval_ms: 5,
        ..LedgerConfig::default()
    };
    let ledger = Arc::new(Anchor::from_config(&config, chain.clone()).unwrap());
    let service = CustodyService::new(
        content.clone(),
        meta.clone(),
        ledger,
        Duration::from_secs(5),
    );
    Harness {
        service,
        content,
        meta,
        chain,
    }
}

const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

fn request(event_type: &str, product: &str) -> RegisterRequest {
    RegisterRequest::new(
        event_type,
        product,
        format!(r#"{{"product":"{product}","step":"{event_type}"}}"#),
        "plant-7",
    )
}

/// Poll until the background anchor has settled the record.
async fn settled(service: &CustodyService, record: &EventRecord) -> EventRecord {
    for _ in 0..200 {
        let current = service.get_by_id(&record.id).await.unwrap();
        if current.state != AnchorState::Pending {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("record {} never left pending", record.id);
}

#[tokio::test]
async fn registered_event_is_pending_with_content_and_fingerprint() {
    let h = harness(None);
    h.chain.set_auto_mine(false);
    let record = h.service.register(request("manufacture", "LOT-1")).await.unwrap();

    assert_eq!(record.state, AnchorState::Pending);
    assert!(!record.content_address.is_empty());
    let hex = record.fingerprint.to_hex();
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(record.anchor.is_none());
}

#[tokio::test]
async fn background_anchor_confirms_record() {
    for contract in [None, Some(CONTRACT)] {
        let h = harness(contract);
        let record = h.service.register(request("manufacture", "LOT-1")).await.unwrap();
        let stored = settled(&h.service, &record).await;

        assert_eq!(stored.state, AnchorState::Confirmed);
        assert!(!stored.anchor_ref().is_empty());
        assert!(!stored.native_tx_ref().is_empty());
        assert!(stored.updated_at >= record.updated_at);

        let status = h.service.anchor_status(&record.id).await.unwrap();
        assert_eq!(status.state, AnchorState::Confirmed);
        assert_eq!(status.anchor_ref, stored.anchor_ref());
    }
}

#[tokio::test]
async fn unreachable_ledger_fails_record() {
    let h = harness(None);
    h.chain.set_online(false);
    let record = h.service.register(request("manufacture", "LOT-1")).await.unwrap();
    let stored = settled(&h.service, &record).await;

    assert_eq!(stored.state, AnchorState::Failed);
    assert!(stored.anchor_ref().is_empty());
    assert!(stored.native_tx_ref().is_empty());

    h.chain.set_online(true);
    let result = h.service.verify_integrity(&record.id).await.unwrap();
    assert!(!result.verified);
}

#[tokio::test]
async fn confirmed_record_with_original_content_verifies() {
    for contract in [None, Some(CONTRACT)] {
        let h = harness(contract);
        let record = h.service.register(request("manufacture", "LOT-1")).await.unwrap();
        settled(&h.service, &record).await;

        let result = h.service.verify_integrity(&record.id).await.unwrap();
        assert!(result.verified, "{}", result.message);
        assert!(result.content_match);
        assert_eq!(result.local_fingerprint, record.fingerprint.to_hex());
        assert_eq!(result.ledger_fingerprint, record.fingerprint.to_hex());
    }
}

#[tokio::test]
async fn replaced_content_fails_verification() {
    let h = harness(Some(CONTRACT));
    let record = h.service.register(request("manufacture", "LOT-1")).await.unwrap();
    settled(&h.service, &record).await;

    h.content
        .replace_unchecked(&record.content_address, br#"{"product":"forged"}"#.to_vec());
    let result = h.service.verify_integrity(&record.id).await.unwrap();
    assert!(!result.verified);
    assert!(!result.content_match);
    assert!(result.message.contains("content store payload differs"));
}

#[tokio::test]
async fn oracle_flags_missing_manufacture_and_backdated_event() {
    let h = harness(None);
    let oracle = Oracle::new(h.service.clone(), &OracleConfig::default());

    let first = h.service.register(request("distribution", "LOT-6")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let second = h.service.register(request("receipt", "LOT-6")).await.unwrap();
    settled(&h.service, &first).await;
    settled(&h.service, &second).await;

    let report = oracle.validate_chain_order("LOT-6").await.unwrap();
    assert!(!report.is_valid());
    assert_eq!(report.violations.len(), 1);
    assert_eq!(
        report.violations[0].kind,
        ChainViolationKind::MissingInitiatingEvent
    );

    let mut backdated = second.clone();
    backdated.id = custody_types::EventId::new();
    backdated.event_type = custody_types::EventType::Verification;
    backdated.event_time = first.event_time - chrono::Duration::hours(1);
    backdated.anchor = None;
    backdated.state = AnchorState::Pending;
    backdated.created_at = Utc::now();
    backdated.updated_at = backdated.created_at;
    h.meta.put(&backdated).await.unwrap();

    let report = oracle.validate_chain_order("LOT-6").await.unwrap();
    let kinds: Vec<_> = report.violations.iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ChainViolationKind::MissingInitiatingEvent,
            ChainViolationKind::ChronologyViolation
        ]
    );
    assert_eq!(report.violations[1].event_id, Some(backdated.id));
    assert_eq!(report.event_count, 3);
}

#[tokio::test]
async fn oracle_view_reports_per_event_outcomes_in_order() {
    let h = harness(Some(CONTRACT));
    let oracle = Oracle::new(h.service.clone(), &OracleConfig { max_concurrency: 2 });

    let mut records = Vec::new();
    for step in ["manufacture", "distribution", "receipt", "verification"] {
        records.push(h.service.register(request(step, "LOT-9")).await.unwrap());
    }
    for record in &records {
        settled(&h.service, record).await;
    }

    let view = oracle.build_verified_view("LOT-9").await.unwrap();
    assert!(view.chain_verified);
    assert_eq!(view.status, ViewStatus::Verified);
    assert_eq!(view.verified_count, 4);
    let ids: Vec<_> = view.history.iter().map(|e| e.id).collect();
    let expected: Vec<_> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, expected);
    assert_eq!(view.metadata["total_events"], "4");
    assert_eq!(view.metadata["last_event_type"], "verification");
    assert!(view.metadata.contains_key("last_event_at"));

    h.content
        .replace_unchecked(&records[1].content_address, b"tampered".to_vec());
    let view = oracle.build_verified_view("LOT-9").await.unwrap();
    assert!(!view.chain_verified);
    assert_eq!(view.status, ViewStatus::Unverified);
    assert_eq!(view.unverified_count, 1);
    assert!(!view.history[1].verified);
    assert!(view.history[1].error.is_some());
    assert!(view.history[0].verified);

    let history = oracle.build_verified_history("LOT-9").await.unwrap();
    assert_eq!((history.total, history.verified, history.unverified), (4, 3, 1));
}

#[tokio::test]
async fn unknown_product_view_is_not_found_but_history_is_empty() {
    let h = harness(None);
    let oracle = Oracle::new(h.service.clone(), &OracleConfig::default());

    assert!(matches!(
        oracle.build_verified_view("NOPE").await,
        Err(CustodyError::NotFound(_))
    ));
    let history = oracle.build_verified_history("NOPE").await.unwrap();
    assert_eq!(history.total, 0);
    assert!(history.events.is_empty());
}

#[tokio::test]
async fn pending_events_count_as_unverified() {
    let h = harness(Some(CONTRACT));
    h.chain.set_auto_mine(false);
    let oracle = Oracle::new(h.service.clone(), &OracleConfig::default());
    h.service.register(request("manufacture", "LOT-3")).await.unwrap();

    let view = oracle.build_verified_view("LOT-3").await.unwrap();
    assert!(!view.chain_verified);
    assert_eq!(
        view.history[0].error.as_deref(),
        Some(custody_core::NOT_YET_ANCHORED)
    );
}

#[tokio::test]
async fn abandoned_caller_does_not_cancel_anchor() {
    let h = harness(Some(CONTRACT));
    h.chain.set_auto_mine(false);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let service = h.service.clone();
    let caller = tokio::spawn(async move {
        let record = service.register(request("manufacture", "LOT-4")).await;
        let _ = tx.send(record);
        std::future::pending::<()>().await;
    });
    let record = rx.await.unwrap().unwrap();
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    for _ in 0..200 {
        if h.chain.transaction_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.chain.mine_pending().await.unwrap(), 1);

    let stored = settled(&h.service, &record).await;
    assert_eq!(stored.state, AnchorState::Confirmed);
    assert!(stored.is_consistent());
}

#[tokio::test]
async fn drain_settles_unawaited_anchors() {
    let h = harness(None);
    let mut records = Vec::new();
    for step in ["manufacture", "distribution"] {
        records.push(h.service.register(request(step, "LOT-5")).await.unwrap());
    }

    h.service.drain().await;
    for record in &records {
        let stored = h.meta.get_by_id(&record.id).await.unwrap();
        assert_eq!(stored.state, AnchorState::Confirmed);
    }
}

fn durable_config(dir: &std::path::Path, contract: Option<&str>) -> CustodyConfig {
    let mut config = CustodyConfig::default();
    config.content.backend = ContentBackend::Fs;
    config.content.root = dir.join("content");
    config.metadata.backend = MetadataBackend::File;
    config.metadata.path = dir.join("records.json");
    config.ledger.contract_address = contract.map(str::to_string);
    config.ledger.poll_interval_ms = 5;
    config
}

fn durable_service(config: &CustodyConfig) -> CustodyService {
    let path = config.chain_snapshot_path().unwrap();
    let chain = Arc::new(InMemoryChain::open(path, 1337).unwrap());
    CustodyService::from_config(config, chain).unwrap()
}

#[tokio::test]
async fn durable_records_verify_in_a_later_session() {
    for contract in [None, Some(CONTRACT)] {
        let dir = tempfile::tempdir().unwrap();
        let config = durable_config(dir.path(), contract);

        let (first, second) = {
            let service = durable_service(&config);
            let first = service.register(request("manufacture", "LOT-8")).await.unwrap();
            let second = service.register(request("distribution", "LOT-8")).await.unwrap();
            service.drain().await;
            (first, second)
        };

        let service = durable_service(&config);
        for record in [&first, &second] {
            let stored = service.get_by_id(&record.id).await.unwrap();
            assert_eq!(stored.state, AnchorState::Confirmed);
            let result = service.verify_integrity(&record.id).await.unwrap();
            assert!(result.verified, "{}", result.message);
        }

        let oracle = Oracle::new(service.clone(), &OracleConfig::default());
        let view = oracle.build_verified_view("LOT-8").await.unwrap();
        assert!(view.chain_verified);
        assert_eq!(view.verified_count, 2);
    }
}
