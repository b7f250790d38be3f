//! Filter criteria for replaying events out of the store.
//!
//! Every criterion is optional; an empty list means "any". Results are always
//! ordered by `(sequence, position)` ascending, and `limit` applies after ordering.

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, ResourceOwner};

use crate::EventEnvelope;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Only events owned by this tenant.
    pub resource_owner: Option<ResourceOwner>,
    /// Only events of these aggregate types (e.g. "idp_config").
    pub aggregate_types: Vec<String>,
    pub aggregate_ids: Vec<AggregateId>,
    /// Only events with these tags (e.g. "idp.config.added").
    pub event_types: Vec<String>,
    /// Exclusive lower sequence bound.
    pub sequence_greater: Option<u64>,
    /// Inclusive upper sequence bound.
    pub sequence_at_most: Option<u64>,
    pub limit: Option<u64>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_owner(mut self, owner: ResourceOwner) -> Self {
        self.resource_owner = Some(owner);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_types.push(aggregate_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_ids.push(id);
        self
    }

    pub fn event_types<I, T>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.event_types.extend(event_types.into_iter().map(Into::into));
        self
    }

    pub fn sequence_greater(mut self, sequence: u64) -> Self {
        self.sequence_greater = Some(sequence);
        self
    }

    pub fn sequence_at_most(mut self, sequence: u64) -> Self {
        self.sequence_at_most = Some(sequence);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a stream `(aggregate_type, aggregate_id)` can contain matches at all.
    pub fn matches_stream(&self, aggregate_type: &str, aggregate_id: &AggregateId) -> bool {
        (self.aggregate_types.is_empty() || self.aggregate_types.iter().any(|t| t == aggregate_type))
            && (self.aggregate_ids.is_empty() || self.aggregate_ids.contains(aggregate_id))
    }

    pub fn matches(&self, event: &EventEnvelope) -> bool {
        if let Some(owner) = &self.resource_owner {
            if &event.resource_owner != owner {
                return false;
            }
        }
        if !self.matches_stream(&event.aggregate_type, &event.aggregate_id) {
            return false;
        }
        if !self.event_types.is_empty() && !self.event_types.iter().any(|t| t == &event.event_type) {
            return false;
        }
        if self.sequence_greater.is_some_and(|min| event.sequence <= min) {
            return false;
        }
        if self.sequence_at_most.is_some_and(|max| event.sequence > max) {
            return false;
        }
        true
    }
}
