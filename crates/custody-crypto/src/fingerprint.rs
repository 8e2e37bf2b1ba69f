//! Event fingerprinting.
//!
//! The fingerprint binds `(id, event_type, product_id, event_time, payload)`
//! and nothing else. Content address, actor and anchoring fields are not
//! part of it, so it can be recomputed from any stored record.

use chrono::{DateTime, SecondsFormat, Utc};
use custody_types::{Fingerprint, FingerprintInput};
use sha2::{Digest, Sha256};

const DOMAIN: &[u8] = b"custody-event-v1";

/// Canonical text form of an event time: RFC 3339, nanosecond precision, UTC.
pub fn format_event_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Compute the SHA-256 fingerprint of an event.
///
/// Each field is length-prefixed; moving bytes from one field into
/// its neighbour changes the digest.
pub fn compute_fingerprint(input: &FingerprintInput<'_>) -> Fingerprint {
    let id = input.id.to_string();
    let time = format_event_time(input.event_time);
    let fields: [&[u8]; 5] = [
        id.as_bytes(),
        input.event_type.as_str().as_bytes(),
        input.product_id.as_bytes(),
        time.as_bytes(),
        input.payload.as_bytes(),
    ];

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    Fingerprint::from_hash(hasher.finalize().into())
}

/// Recompute and compare against an expected fingerprint.
pub fn verify_fingerprint(input: &FingerprintInput<'_>, expected: &Fingerprint) -> bool {
    compute_fingerprint(input) == *expected
}
