use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use warden_core::StreamId;
use warden_events::{EventEnvelope, SearchQuery};

use super::r#trait::{AppendBatch, EventStore, EventStoreError};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamId, Vec<EventEnvelope>>,
    /// Last assigned global position.
    position: u64,
}

impl Inner {
    fn head(&self, stream: &StreamId) -> u64 {
        self.streams
            .get(stream)
            .and_then(|s| s.last())
            .map(|e| e.sequence)
            .unwrap_or(0)
    }
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance. A push checks and
/// stages the whole batch before the first event becomes visible, all under
/// one write lock, so a failing or dropped push leaves nothing behind.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn stage(inner: &Inner, batch: AppendBatch) -> Result<Vec<EventEnvelope>, EventStoreError> {
        // Ownership first: a stream head counts every tenant's events, so a
        // foreign stream must never surface as a concurrency conflict.
        for e in batch.events() {
            let stream = e.stream_id();
            if let Some(first) = inner.streams.get(&stream).and_then(|s| s.first()) {
                if &first.resource_owner != e.aggregate.resource_owner() {
                    return Err(EventStoreError::TenantIsolation(format!(
                        "stream {stream} belongs to '{}', attempted append for '{}'",
                        first.resource_owner,
                        e.aggregate.resource_owner()
                    )));
                }
            }
        }

        for (stream, expected) in batch.expectations() {
            let current = inner.head(stream);
            if !expected.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "{stream}: expected sequence {expected}, found {current}"
                )));
            }
        }

        let (events, _) = batch.into_parts();
        let creation_date = Utc::now();
        let mut heads: HashMap<StreamId, u64> = HashMap::new();
        let mut staged = Vec::with_capacity(events.len());

        for (offset, e) in events.into_iter().enumerate() {
            let stream = e.stream_id();
            let head = heads.entry(stream).or_insert_with_key(|s| inner.head(s));
            *head += 1;

            staged.push(EventEnvelope {
                event_id: e.event_id,
                aggregate_type: e.aggregate.aggregate_type().to_string(),
                aggregate_id: e.aggregate.id().clone(),
                resource_owner: e.aggregate.resource_owner().clone(),
                event_type: e.event_type,
                event_version: e.event_version,
                sequence: *head,
                position: inner.position + offset as u64 + 1,
                payload: e.payload,
                creation_date,
                editor_user: e.editor_user,
                correlation_id: e.correlation_id,
                causation_id: e.causation_id,
            });
        }
        Ok(staged)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn push(&self, batch: AppendBatch) -> Result<Vec<EventEnvelope>, EventStoreError> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        batch.validate()?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::StorageUnavailable("lock poisoned".to_string()))?;

        let committed = Self::stage(&inner, batch)?;

        // Nothing below can fail: the batch becomes visible as a whole.
        for e in &committed {
            inner.streams.entry(e.stream_id()).or_default().push(e.clone());
        }
        inner.position += committed.len() as u64;

        tracing::debug!(
            event_count = committed.len(),
            position = inner.position,
            "committed batch"
        );
        Ok(committed)
    }

    async fn filter(&self, query: &SearchQuery) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::StorageUnavailable("lock poisoned".to_string()))?;

        let mut events: Vec<EventEnvelope> = inner
            .streams
            .iter()
            .filter(|(stream, _)| query.matches_stream(&stream.aggregate_type, &stream.aggregate_id))
            .flat_map(|(_, events)| events.iter())
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        events.sort_by_key(|e| (e.sequence, e.position));
        if let Some(limit) = query.limit {
            events.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::UncommittedEvent;
    use proptest::prelude::*;
    use uuid::Uuid;
    use warden_core::{AggregateRef, ExpectedSequence};

    fn event(aggregate_type: &str, id: &str, owner: &str, event_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate: AggregateRef::new(aggregate_type, id.into(), owner.into()),
            event_type: event_type.to_string(),
            event_version: 1,
            payload: b"{}".to_vec(),
            editor_user: "tester".into(),
            correlation_id: None,
            causation_id: None,
        }
    }

    fn idp(id: &str) -> UncommittedEvent {
        event("idp_config", id, "org-1", "idp.config.added")
    }

    fn stream(id: &str) -> StreamId {
        StreamId::new("idp_config", id.into())
    }

    fn all() -> SearchQuery {
        SearchQuery::new()
    }

    #[tokio::test]
    async fn sequences_are_per_stream_and_positions_global() {
        let store = InMemoryEventStore::new();
        let committed = store
            .push(AppendBatch::new().with_event(idp("a")).with_event(idp("b")).with_event(idp("a")))
            .await
            .unwrap();

        let seqs: Vec<_> = committed.iter().map(|e| (e.aggregate_id.as_str().to_string(), e.sequence)).collect();
        assert_eq!(seqs, vec![("a".into(), 1), ("b".into(), 1), ("a".into(), 2)]);
        let positions: Vec<_> = committed.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stale_expectation_is_a_conflict() {
        let store = InMemoryEventStore::new();
        store.push(AppendBatch::new().with_event(idp("a"))).await.unwrap();

        let mut batch = AppendBatch::new().with_event(idp("a"));
        batch.expect(stream("a"), ExpectedSequence::Exact(0));
        let err = store.push(batch).await.unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));

        let mut batch = AppendBatch::new().with_event(idp("a"));
        batch.expect(stream("a"), ExpectedSequence::Exact(1));
        assert_eq!(store.push(batch).await.unwrap()[0].sequence, 2);
    }

    #[tokio::test]
    async fn failed_push_commits_nothing() {
        let store = InMemoryEventStore::new();
        store.push(AppendBatch::new().with_event(idp("b"))).await.unwrap();

        // Stream "a" is fine, stream "b" is stale: neither may change.
        let mut batch = AppendBatch::new().with_event(idp("a")).with_event(idp("b"));
        batch.expect(stream("a"), ExpectedSequence::Exact(0));
        batch.expect(stream("b"), ExpectedSequence::Exact(0));
        assert!(store.push(batch).await.is_err());

        let events = store.filter(&all()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate_id.as_str(), "b");

        let next = store.push(AppendBatch::new().with_event(idp("c"))).await.unwrap();
        assert_eq!(next[0].position, 2);
    }

    #[tokio::test]
    async fn resource_owner_is_fixed_by_first_event() {
        let store = InMemoryEventStore::new();
        store.push(AppendBatch::new().with_event(idp("a"))).await.unwrap();

        let foreign = event("idp_config", "a", "org-2", "idp.config.changed");
        let err = store.push(AppendBatch::new().with_event(foreign)).await.unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[tokio::test]
    async fn foreign_owner_wins_over_stale_expectation() {
        let store = InMemoryEventStore::new();
        store.push(AppendBatch::new().with_event(idp("a"))).await.unwrap();

        // org-2 sees an empty stream and expects sequence 0.
        let mut batch = AppendBatch::new().with_event(event("idp_config", "a", "org-2", "idp.config.added"));
        batch.expect(stream("a"), ExpectedSequence::Exact(0));
        let err = store.push(batch).await.unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
        assert_eq!(store.filter(&all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_commits_nothing() {
        let store = InMemoryEventStore::new();
        let mut batch = AppendBatch::new();
        batch.expect(stream("a"), ExpectedSequence::Exact(7));
        assert!(store.push(batch).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_orders_by_sequence_then_position_and_limits() {
        let store = InMemoryEventStore::new();
        store.push(AppendBatch::new().with_event(idp("a")).with_event(idp("a"))).await.unwrap();
        store
            .push(AppendBatch::new().with_event(event("user", "u", "org-1", "user.external_idp.added")))
            .await
            .unwrap();
        store.push(AppendBatch::new().with_event(idp("b"))).await.unwrap();

        let events = store.filter(&all()).await.unwrap();
        let order: Vec<_> = events.iter().map(|e| (e.sequence, e.position)).collect();
        assert_eq!(order, vec![(1, 1), (1, 3), (1, 4), (2, 2)]);

        let limited = store.filter(&all().aggregate_type("idp_config").limit(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert!(limited.iter().all(|e| e.aggregate_type == "idp_config"));

        let tail = store
            .filter(&all().aggregate_type("idp_config").aggregate_id("a".into()).sequence_greater(1))
            .await
            .unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].sequence, 2);

        let other_org = store.filter(&all().resource_owner("org-2".into())).await.unwrap();
        assert!(other_org.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn stream_sequences_stay_contiguous(batches in proptest::collection::vec(
            proptest::collection::vec(0usize..3, 1..5),
            1..12,
        )) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let ids = ["a", "b", "c"];
            let store = InMemoryEventStore::new();
            rt.block_on(async {
                for batch in &batches {
                    let mut append = AppendBatch::new();
                    for &i in batch {
                        append.push(idp(ids[i]));
                    }
                    store.push(append).await.unwrap();
                }
            });

            for id in ids {
                let events = rt.block_on(store.filter(&all().aggregate_id(id.into()))).unwrap();
                let seqs: Vec<u64> = events.iter().map(|e| e.sequence).collect();
                let expected: Vec<u64> = (1..=events.len() as u64).collect();
                prop_assert_eq!(seqs, expected);
                prop_assert!(events.windows(2).all(|w| w[0].position < w[1].position));
            }
        }
    }
}
