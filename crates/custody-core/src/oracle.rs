//! Oracle aggregation.
//!
//! Replays integrity verification over a product's full event history and
//! derives chain-level facts from it: whether every event verifies, and
//! whether the history starts properly and runs forward in time.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use custody_types::{EventId, EventRecord, EventType};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::error::{CustodyError, CustodyResult};
use crate::service::CustodyService;

/// Verification outcome for one event of a product history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedEvent {
    pub id: EventId,
    pub event_type: EventType,
    pub event_time: DateTime<Utc>,
    pub verified: bool,
    pub anchor_ref: String,
    pub content_address: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifiedEvent {
    fn unverified(record: &EventRecord, error: impl Into<String>) -> Self {
        Self {
            id: record.id,
            event_type: record.event_type,
            event_time: record.event_time,
            verified: false,
            anchor_ref: record.anchor_ref().to_string(),
            content_address: record.content_address.to_string(),
            actor: record.actor.clone(),
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    Verified,
    Unverified,
}

/// Verified view of a product's custody chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleView {
    pub product_id: String,
    pub status: ViewStatus,
    pub last_updated: DateTime<Utc>,
    pub chain_verified: bool,
    pub verified_count: usize,
    pub unverified_count: usize,
    pub history: Vec<VerifiedEvent>,
    pub metadata: BTreeMap<String, String>,
}

/// Per-event verification results with totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedHistory {
    pub product_id: String,
    pub total: usize,
    pub verified: usize,
    pub unverified: usize,
    pub events: Vec<VerifiedEvent>,
    pub queried_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainViolationKind {
    /// No event of an initiating type (manufacture) exists.
    MissingInitiatingEvent,
    /// An event is dated before the event stored just before it.
    ChronologyViolation,
}

/// One problem found in a product's custody chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainViolation {
    pub kind: ChainViolationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub description: String,
}

/// Result of chain-order validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub product_id: String,
    pub event_count: usize,
    pub violations: Vec<ChainViolation>,
}

impl ChainReport {
    /// Returns `true` if no violation was found.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check a product's records, in stored order, for a missing initiating
/// event and for events dated before their predecessor. Every violation is
/// reported.
pub fn check_chain_order(records: &[EventRecord]) -> Vec<ChainViolation> {
    let mut violations = Vec::new();

    if !records.iter().any(|r| r.event_type.is_initiating()) {
        violations.push(ChainViolation {
            kind: ChainViolationKind::MissingInitiatingEvent,
            event_id: None,
            description: format!("no {} event recorded", EventType::Manufacture),
        });
    }

    for pair in records.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.event_time < prev.event_time {
            violations.push(ChainViolation {
                kind: ChainViolationKind::ChronologyViolation,
                event_id: Some(cur.id),
                description: format!(
                    "event {} at {} precedes previous event {} at {}",
                    cur.id,
                    rfc3339(&cur.event_time),
                    prev.id,
                    rfc3339(&prev.event_time)
                ),
            });
        }
    }

    violations
}

/// Builds verified views over a [`CustodyService`].
#[derive(Clone, Debug)]
pub struct Oracle {
    service: CustodyService,
    max_concurrency: usize,
}

impl Oracle {
    pub fn new(service: CustodyService, config: &OracleConfig) -> Self {
        Self {
            service,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Verify every event of `product_id` and summarise the chain.
    ///
    /// Fails with `NotFound` when the product has no events. A failing
    /// verification only marks its own event unverified.
    pub async fn build_verified_view(&self, product_id: &str) -> CustodyResult<OracleView> {
        let records = self.service.list_by_product(product_id).await?;
        if records.is_empty() {
            return Err(CustodyError::NotFound(format!("no events for product {product_id}")));
        }

        let history = self.verify_all(&records).await;
        let verified_count = history.iter().filter(|e| e.verified).count();
        let unverified_count = history.len() - verified_count;
        let chain_verified = unverified_count == 0;

        let mut metadata = BTreeMap::new();
        metadata.insert("total_events".to_string(), records.len().to_string());
        if let Some(latest) = records.iter().map(|r| r.event_time).max() {
            metadata.insert("last_event_at".to_string(), rfc3339(&latest));
        }
        if let Some(last) = records.last() {
            metadata.insert("last_event_type".to_string(), last.event_type.to_string());
        }

        if !chain_verified {
            warn!(product = product_id, unverified_count, "custody chain not fully verified");
        }

        Ok(OracleView {
            product_id: product_id.to_string(),
            status: if chain_verified {
                ViewStatus::Verified
            } else {
                ViewStatus::Unverified
            },
            last_updated: Utc::now(),
            chain_verified,
            verified_count,
            unverified_count,
            history,
            metadata,
        })
    }

    /// Verify every event of `product_id`; an unknown product yields an
    /// empty history.
    pub async fn build_verified_history(&self, product_id: &str) -> CustodyResult<VerifiedHistory> {
        let records = self.service.list_by_product(product_id).await?;
        let events = self.verify_all(&records).await;
        let verified = events.iter().filter(|e| e.verified).count();
        Ok(VerifiedHistory {
            product_id: product_id.to_string(),
            total: events.len(),
            verified,
            unverified: events.len() - verified,
            events,
            queried_at: Utc::now(),
        })
    }

    /// Check that the product's history starts with an initiating event and
    /// runs forward in time.
    pub async fn validate_chain_order(&self, product_id: &str) -> CustodyResult<ChainReport> {
        let records = self.service.list_by_product(product_id).await?;
        let violations = check_chain_order(&records);
        if !violations.is_empty() {
            warn!(
                product = product_id,
                violations = violations.len(),
                "custody chain order violated"
            );
        }
        Ok(ChainReport {
            product_id: product_id.to_string(),
            event_count: records.len(),
            violations,
        })
    }

    /// Verify records concurrently, returning outcomes in input order.
    async fn verify_all(&self, records: &[EventRecord]) -> Vec<VerifiedEvent> {
        let mut outcomes: Vec<VerifiedEvent> = records
            .iter()
            .map(|r| VerifiedEvent::unverified(r, "verification did not complete"))
            .collect();

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        for (index, record) in records.iter().enumerate() {
            let service = self.service.clone();
            let permits = permits.clone();
            let record = record.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let outcome = match service.verify_integrity(&record.id).await {
                    Ok(result) => VerifiedEvent {
                        verified: result.verified,
                        error: (!result.verified).then_some(result.message),
                        ..VerifiedEvent::unverified(&record, "")
                    },
                    Err(e) => VerifiedEvent::unverified(&record, e.to_string()),
                };
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = outcome,
                Err(e) => warn!(error = %e, "verification task aborted"),
            }
        }
        debug!(events = records.len(), "history verified");
        outcomes
    }
}

fn rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use custody_types::{AnchorState, ContentAddress, Fingerprint};

    use super::*;

    fn record_at(event_type: EventType, offset_secs: i64) -> EventRecord {
        let base = DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let at = base + Duration::seconds(offset_secs);
        EventRecord {
            id: EventId::new(),
            event_type,
            product_id: "LOT-1".into(),
            event_time: at,
            payload: "{}".into(),
            fingerprint: Fingerprint::from_hash([1; 32]),
            anchor: None,
            content_address: ContentAddress::new("b3x"),
            actor: "a".into(),
            state: AnchorState::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn well_ordered_chain_has_no_violations() {
        let records = vec![
            record_at(EventType::Manufacture, 0),
            record_at(EventType::Distribution, 10),
            record_at(EventType::Receipt, 10),
            record_at(EventType::Verification, 20),
        ];
        assert!(check_chain_order(&records).is_empty());
    }

    #[test]
    fn reports_missing_manufacture_and_every_regression() {
        let records = vec![
            record_at(EventType::Distribution, 100),
            record_at(EventType::Receipt, 50),
            record_at(EventType::Verification, 60),
            record_at(EventType::Verification, 10),
        ];
        let violations = check_chain_order(&records);
        let kinds: Vec<_> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChainViolationKind::MissingInitiatingEvent,
                ChainViolationKind::ChronologyViolation,
                ChainViolationKind::ChronologyViolation,
            ]
        );
        assert_eq!(violations[1].event_id, Some(records[1].id));
        assert_eq!(violations[2].event_id, Some(records[3].id));
    }

    #[test]
    fn manufacture_need_not_be_first() {
        let records = vec![
            record_at(EventType::Distribution, 0),
            record_at(EventType::Manufacture, 5),
        ];
        assert!(check_chain_order(&records).is_empty());
    }

    #[test]
    fn empty_history_lacks_initiating_event() {
        let violations = check_chain_order(&[]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ChainViolationKind::MissingInitiatingEvent);
    }
}
