use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Unique identifier for an event record (UUID v7 for time-ordering).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(uuid::Uuid);

impl EventId {
    /// Generate a new time-ordered event ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for EventId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| TypeError::InvalidEventId(e.to_string()))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.short_id())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of custody event being recorded.
///
/// A well-formed chain of custody starts with [`EventType::Manufacture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Manufacture,
    Distribution,
    Receipt,
    Verification,
}

impl EventType {
    /// Every accepted event type, in the order a product normally moves
    /// through them.
    pub const ALL: [EventType; 4] = [
        Self::Manufacture,
        Self::Distribution,
        Self::Receipt,
        Self::Verification,
    ];

    /// Wire name of the event type. This string is part of the fingerprint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manufacture => "manufacture",
            Self::Distribution => "distribution",
            Self::Receipt => "receipt",
            Self::Verification => "verification",
        }
    }

    /// Returns `true` if this event type starts a chain of custody.
    pub fn is_initiating(&self) -> bool {
        matches!(self, Self::Manufacture)
    }
}

impl FromStr for EventType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownEventType(s.to_string()))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anchoring lifecycle of an event record.
///
/// `Pending` is the only non-terminal state. Records move to `Confirmed`
/// once the ledger accepts the fingerprint, or to `Failed` if the single
/// anchoring attempt errors. Neither terminal state can be left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorState {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl AnchorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for `Confirmed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: AnchorState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed) | (Self::Pending, Self::Failed)
        )
    }
}

impl FromStr for AnchorState {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(TypeError::UnknownAnchorState(other.to_string())),
        }
    }
}

impl fmt::Display for AnchorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn event_id_parses_its_display_form() {
        let id = EventId::new();
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<EventId>().is_err());
    }

    #[test]
    fn event_type_wire_names() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
        assert_eq!(
            "shipping".parse::<EventType>(),
            Err(TypeError::UnknownEventType("shipping".into()))
        );
        // Parsing is exact; callers normalise case before validation.
        assert!("Manufacture".parse::<EventType>().is_err());
    }

    #[test]
    fn event_type_serde_uses_lowercase() {
        let json = serde_json::to_string(&EventType::Distribution).unwrap();
        assert_eq!(json, "\"distribution\"");
    }

    #[test]
    fn only_manufacture_initiates() {
        assert!(EventType::Manufacture.is_initiating());
        assert!(!EventType::Receipt.is_initiating());
    }

    #[test]
    fn state_transitions() {
        use AnchorState::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Confirmed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Confirmed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn default_state_is_pending() {
        assert_eq!(AnchorState::default(), AnchorState::Pending);
    }
}
