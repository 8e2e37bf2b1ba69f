use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{AnchorState, EventId, EventType};
use crate::fingerprint::Fingerprint;

/// Opaque reference returned by the content store.
///
/// The address deterministically maps back to the stored bytes; callers
/// never interpret it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.0)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an anchored fingerprint can be found on the ledger.
///
/// `logical_ref` is the key the anchor is recoverable under; in direct
/// transaction mode it is the same string as `native_tx_ref`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRef {
    pub logical_ref: String,
    pub native_tx_ref: String,
}

impl AnchorRef {
    pub fn new(logical_ref: impl Into<String>, native_tx_ref: impl Into<String>) -> Self {
        Self {
            logical_ref: logical_ref.into(),
            native_tx_ref: native_tx_ref.into(),
        }
    }

    /// Both references are present.
    pub fn is_complete(&self) -> bool {
        !self.logical_ref.is_empty() && !self.native_tx_ref.is_empty()
    }
}

/// Caller-supplied intake request.
///
/// `event_type` is kept as a raw string so validation can report an
/// out-of-enumeration value alongside every other violated field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub event_type: String,
    pub product_id: String,
    pub payload: String,
    pub actor: String,
}

impl RegisterRequest {
    pub fn new(
        event_type: impl Into<String>,
        product_id: impl Into<String>,
        payload: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            product_id: product_id.into(),
            payload: payload.into(),
            actor: actor.into(),
        }
    }
}

/// The five fields bound by an event fingerprint.
#[derive(Clone, Copy, Debug)]
pub struct FingerprintInput<'a> {
    pub id: &'a EventId,
    pub event_type: EventType,
    pub product_id: &'a str,
    pub event_time: &'a DateTime<Utc>,
    pub payload: &'a str,
}

/// A chain-of-custody event as persisted in the metadata store.
///
/// Everything except `anchor`, `state` and `updated_at` is fixed at
/// creation. `anchor` is `Some` exactly when `state` is `Confirmed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: EventId,
    pub event_type: EventType,
    pub product_id: String,
    pub event_time: DateTime<Utc>,
    pub payload: String,
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub anchor: Option<AnchorRef>,
    pub content_address: ContentAddress,
    pub actor: String,
    pub state: AnchorState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// Borrow the fingerprinted fields in their stored form.
    pub fn fingerprint_input(&self) -> FingerprintInput<'_> {
        FingerprintInput {
            id: &self.id,
            event_type: self.event_type,
            product_id: &self.product_id,
            event_time: &self.event_time,
            payload: &self.payload,
        }
    }

    /// Logical ledger reference, empty until anchoring succeeds.
    pub fn anchor_ref(&self) -> &str {
        self.anchor.as_ref().map_or("", |a| a.logical_ref.as_str())
    }

    /// Native ledger transaction id, empty until anchoring succeeds.
    pub fn native_tx_ref(&self) -> &str {
        self.anchor.as_ref().map_or("", |a| a.native_tx_ref.as_str())
    }

    pub fn is_anchored(&self) -> bool {
        !self.anchor_ref().is_empty()
    }

    /// Checks the anchor/state pairing: references are present if and
    /// only if the record is confirmed.
    pub fn is_consistent(&self) -> bool {
        let anchored = self.anchor.as_ref().is_some_and(AnchorRef::is_complete);
        anchored == (self.state == AnchorState::Confirmed)
    }
}
