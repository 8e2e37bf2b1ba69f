//! Backend-independent record table.
//!
//! [`RecordTable`] holds records in insertion order with an id index and
//! implements every lifecycle rule. Backends wrap it in a lock and add
//! persistence or availability on top.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use custody_types::{AnchorRef, AnchorState, EventId, EventRecord};
use serde::{Deserialize, Serialize};

use crate::error::{MetaError, MetaResult};

/// Insertion-ordered table of event records.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<EventRecord>", into = "Vec<EventRecord>")]
pub struct RecordTable {
    records: Vec<EventRecord>,
    index: HashMap<EventId, usize>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, record: EventRecord) -> MetaResult<()> {
        if self.index.contains_key(&record.id) {
            return Err(MetaError::AlreadyExists(record.id));
        }
        if !record.is_consistent() {
            return Err(MetaError::Inconsistent {
                id: record.id,
                reason: format!(
                    "state {} does not match anchor references {:?}",
                    record.state, record.anchor
                ),
            });
        }
        self.index.insert(record.id, self.records.len());
        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, id: &EventId) -> MetaResult<&EventRecord> {
        self.index
            .get(id)
            .map(|&i| &self.records[i])
            .ok_or(MetaError::NotFound(*id))
    }

    pub fn scan_by_product(&self, product_id: &str) -> Vec<EventRecord> {
        self.records
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect()
    }

    pub fn scan_all(&self, limit: Option<usize>) -> Vec<EventRecord> {
        let take = limit.unwrap_or(self.records.len());
        self.records.iter().take(take).cloned().collect()
    }

    pub fn set_state(
        &mut self,
        id: &EventId,
        state: AnchorState,
        now: DateTime<Utc>,
    ) -> MetaResult<()> {
        if state == AnchorState::Confirmed {
            return Err(MetaError::AnchorRequired(*id));
        }
        let record = self.get_mut(id)?;
        if !record.state.can_transition_to(state) {
            return Err(MetaError::InvalidTransition {
                id: *id,
                from: record.state,
                to: state,
            });
        }
        record.state = state;
        record.updated_at = now;
        Ok(())
    }

    pub fn set_anchor(
        &mut self,
        id: &EventId,
        anchor: &AnchorRef,
        now: DateTime<Utc>,
    ) -> MetaResult<()> {
        if !anchor.is_complete() {
            return Err(MetaError::Inconsistent {
                id: *id,
                reason: "logical and native references must both be non-empty".into(),
            });
        }
        let record = self.get_mut(id)?;
        if !record.state.can_transition_to(AnchorState::Confirmed) {
            return Err(MetaError::InvalidTransition {
                id: *id,
                from: record.state,
                to: AnchorState::Confirmed,
            });
        }
        record.anchor = Some(anchor.clone());
        record.state = AnchorState::Confirmed;
        record.updated_at = now;
        Ok(())
    }

    fn get_mut(&mut self, id: &EventId) -> MetaResult<&mut EventRecord> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.records[i]),
            None => Err(MetaError::NotFound(*id)),
        }
    }
}

impl From<Vec<EventRecord>> for RecordTable {
    fn from(records: Vec<EventRecord>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
        Self { records, index }
    }
}

impl From<RecordTable> for Vec<EventRecord> {
    fn from(table: RecordTable) -> Self {
        table.records
    }
}
