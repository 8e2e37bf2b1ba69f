use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{AnchorState, EventId};
use crate::record::EventRecord;

/// Outcome of re-checking one record against the ledger and content store.
///
/// A mismatch is not an error: it is a well-formed result with
/// `verified == false` and the discrepancy described in `message`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub id: EventId,
    pub verified: bool,
    /// Fingerprint recomputed from the stored fields (hex, empty if the
    /// check stopped before recomputation).
    pub local_fingerprint: String,
    /// Fingerprint reported for the anchored record (hex, empty if the
    /// ledger was not consulted).
    pub ledger_fingerprint: String,
    pub content_match: bool,
    pub message: String,
}

impl VerificationResult {
    /// An unverified result carrying only a message.
    pub fn unverified(id: EventId, message: impl Into<String>) -> Self {
        Self {
            id,
            verified: false,
            local_fingerprint: String::new(),
            ledger_fingerprint: String::new(),
            content_match: false,
            message: message.into(),
        }
    }
}

/// Anchoring status of a record, as observed by a later read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorStatus {
    pub id: EventId,
    pub state: AnchorState,
    pub anchor_ref: String,
    pub native_tx_ref: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&EventRecord> for AnchorStatus {
    fn from(record: &EventRecord) -> Self {
        Self {
            id: record.id,
            state: record.state,
            anchor_ref: record.anchor_ref().to_string(),
            native_tx_ref: record.native_tx_ref().to_string(),
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unverified_result_is_empty() {
        let id = EventId::new();
        let r = VerificationResult::unverified(id, "not yet anchored");
        assert!(!r.verified);
        assert!(!r.content_match);
        assert!(r.local_fingerprint.is_empty());
        assert_eq!(r.message, "not yet anchored");
    }
}
