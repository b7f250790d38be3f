use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use warden_core::{ActorId, AggregateRef, ExpectedSequence, StreamId};
use warden_events::{CommandContext, Event, EventEnvelope, SearchQuery};

/// An event ready to be appended (not yet assigned a sequence or position).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// encodes the payload and stamps the actor and correlation id of the command
/// that produced it. The store assigns `sequence`, `position` and
/// `creation_date` when the batch commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    /// Target stream and owning tenant. Its sequence is ignored on append.
    pub aggregate: AggregateRef,
    pub event_type: String,
    pub event_version: u32,
    pub payload: Vec<u8>,
    pub editor_user: ActorId,
    pub correlation_id: Option<String>,
    pub causation_id: Option<Uuid>,
}

impl UncommittedEvent {
    pub fn from_typed<E: Event>(
        ctx: &CommandContext,
        aggregate: &AggregateRef,
        event: &E,
    ) -> Result<Self, EventStoreError> {
        let payload = event
            .encode()
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            aggregate: aggregate.clone(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            payload,
            editor_user: ctx.actor().clone(),
            correlation_id: ctx.correlation_id().map(str::to_string),
            causation_id: None,
        })
    }

    pub fn stream_id(&self) -> StreamId {
        self.aggregate.stream_id()
    }
}

/// Ordered events for one or more streams, committed as a single unit.
///
/// Expectations are optional and per stream: a stream without one is appended
/// unconditionally (e.g. a freshly generated aggregate id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendBatch {
    events: Vec<UncommittedEvent>,
    expectations: Vec<(StreamId, ExpectedSequence)>,
}

impl AppendBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: UncommittedEvent) {
        self.events.push(event);
    }

    pub fn with_event(mut self, event: UncommittedEvent) -> Self {
        self.push(event);
        self
    }

    /// Condition the commit on `stream`'s head. A later expectation for the
    /// same stream replaces the earlier one.
    pub fn expect(&mut self, stream: StreamId, expected: ExpectedSequence) {
        match self.expectations.iter_mut().find(|(s, _)| s == &stream) {
            Some((_, existing)) => *existing = expected,
            None => self.expectations.push((stream, expected)),
        }
    }

    pub fn events(&self) -> &[UncommittedEvent] {
        &self.events
    }

    pub fn expectations(&self) -> &[(StreamId, ExpectedSequence)] {
        &self.expectations
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn into_parts(self) -> (Vec<UncommittedEvent>, Vec<(StreamId, ExpectedSequence)>) {
        (self.events, self.expectations)
    }

    /// Structural checks every backend runs before touching storage: one
    /// resource owner per stream within the batch, and no duplicate event ids.
    pub fn validate(&self) -> Result<(), EventStoreError> {
        let mut ids = HashSet::with_capacity(self.events.len());
        for (idx, e) in self.events.iter().enumerate() {
            if !ids.insert(e.event_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "duplicate event_id {} (index {idx})",
                    e.event_id
                )));
            }
            if e.event_type.is_empty() {
                return Err(EventStoreError::InvalidAppend(format!("empty event_type (index {idx})")));
            }
            let conflicting = self.events[..idx].iter().find(|prev| {
                prev.aggregate.stream_id() == e.aggregate.stream_id()
                    && prev.aggregate.resource_owner() != e.aggregate.resource_owner()
            });
            if conflicting.is_some() {
                return Err(EventStoreError::TenantIsolation(format!(
                    "batch contains multiple resource owners for {} (index {idx})",
                    e.stream_id()
                )));
            }
        }
        Ok(())
    }
}

/// Event store errors.
///
/// ## Error Types
///
/// - **Concurrency**: an expectation did not match the stream head at commit time (retriable)
/// - **StorageUnavailable**: the backend could not be reached or failed mid-operation (retriable)
/// - **CorruptEvent**: a persisted record could not be read back
/// - **TenantIsolation**: an append tried to change a stream's resource owner
/// - **InvalidAppend**: the batch itself is malformed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("corrupt event: {0}")]
    CorruptEvent(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only, multi-stream event store.
///
/// ## Streams
///
/// A stream is keyed by `(aggregate_type, aggregate_id)`. Within a stream
/// sequences are contiguous from 1; across the whole store every event also
/// gets a strictly increasing `position`. The first event of a stream fixes
/// its resource owner.
///
/// ## Push Semantics
///
/// `push()`:
/// - checks every expectation against the current stream heads
/// - assigns sequences in batch order (per stream) and positions in batch order (globally)
/// - persists everything or nothing
/// - returns the committed envelopes in batch order
///
/// Dropping the returned future before it resolves must not leave partial
/// events behind.
///
/// ## Filter Semantics
///
/// `filter()` returns every matching event ordered by `(sequence, position)`
/// ascending, then truncated to `limit`. The result is a finite snapshot and can
/// be replayed any number of times.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn push(&self, batch: AppendBatch) -> Result<Vec<EventEnvelope>, EventStoreError>;

    async fn filter(&self, query: &SearchQuery) -> Result<Vec<EventEnvelope>, EventStoreError>;
}

#[async_trait]
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    async fn push(&self, batch: AppendBatch) -> Result<Vec<EventEnvelope>, EventStoreError> {
        (**self).push(batch).await
    }

    async fn filter(&self, query: &SearchQuery) -> Result<Vec<EventEnvelope>, EventStoreError> {
        (**self).filter(query).await
    }
}
