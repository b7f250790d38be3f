use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_core::{ActorId, AggregateId, AggregateRef, ResourceOwner, StreamId};

use crate::event::{DecodeError, Decoded, Event};

/// A committed event, exactly as the event store persists it.
///
/// Notes:
/// - **Multi-tenancy** is carried by `resource_owner`; it never changes within a stream.
/// - **Append-only**: `sequence` is contiguous from 1 per stream, `position`
///   is the store-wide append order used to break ties.
/// - `payload` is opaque bytes; its schema is keyed by `event_type`.
///
/// Envelopes are facts. Nothing mutates one after the store hands it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,

    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
    pub resource_owner: ResourceOwner,

    pub event_type: String,
    pub event_version: u32,

    /// Position in the aggregate stream.
    pub sequence: u64,
    /// Global append order across all streams.
    pub position: u64,

    pub payload: Vec<u8>,

    pub creation_date: DateTime<Utc>,
    pub editor_user: ActorId,
    pub correlation_id: Option<String>,
    pub causation_id: Option<Uuid>,
}

impl EventEnvelope {
    pub fn stream_id(&self) -> StreamId {
        StreamId::new(self.aggregate_type.clone(), self.aggregate_id.clone())
    }

    /// Reference to the aggregate as of this event.
    pub fn aggregate_ref(&self) -> AggregateRef {
        AggregateRef::new(
            self.aggregate_type.clone(),
            self.aggregate_id.clone(),
            self.resource_owner.clone(),
        )
        .at_sequence(self.sequence)
    }

    pub fn decode<E: Event>(&self) -> Result<Decoded<E>, DecodeError> {
        E::decode(&self.event_type, &self.payload)
    }
}
