//! Postgres-backed event store implementation.
//!
//! This module provides a persistent event store using PostgreSQL as the backing storage.
//! It enforces tenant isolation, optimistic concurrency control, and append-only semantics
//! at the database level.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `EventStoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | EventStoreError | Scenario |
//! |------------|----------------------|-----------------|----------|
//! | Database (unique violation) | `23505` | `Concurrency` | Another transaction committed the same `(aggregate_type, aggregate_id, sequence)` first |
//! | Database (check / not-null violation) | `23514`, `23502` | `InvalidAppend` | Malformed record |
//! | Database (other) | Any other | `StorageUnavailable` | Server-side failure |
//! | Decode / ColumnDecode / ColumnNotFound | N/A | `CorruptEvent` | Stored row cannot be read back |
//! | Pool, IO, TLS, protocol | N/A | `StorageUnavailable` | Connection failures, timeouts |
//!
//! ## Cancellation
//!
//! Appends run in one transaction. Dropping the `push` future before commit
//! drops the transaction, which rolls back.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{instrument, Span};

use warden_core::StreamId;
use warden_events::{EventEnvelope, SearchQuery};

use super::r#trait::{AppendBatch, EventStore, EventStoreError};

/// Postgres-backed append-only event store.
///
/// ## Optimistic Concurrency
///
/// `push()` uses a transaction to:
/// 1. Read the head (highest sequence and owner) of every stream the batch touches
/// 2. Reject events for streams owned by another resource owner
/// 3. Validate the batch's expectations against those heads
/// 4. Insert the events with the next sequences
///
/// If another transaction commits between steps 1 and 4, the unique constraint
/// on `(aggregate_type, aggregate_id, sequence)` makes the insert fail, which
/// surfaces as a concurrency error.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Create a new PostgresEventStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, EventStoreError> {
        tracing::info!(max_connections, "connecting event store to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EventStoreError::StorageUnavailable(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append a batch with optimistic concurrency control.
    #[instrument(
        skip(self, batch),
        fields(
            event_count = batch.len(),
            expectations = batch.expectations().len(),
            committed_position = tracing::field::Empty
        ),
        err
    )]
    pub async fn append_batch(&self, batch: AppendBatch) -> Result<Vec<EventEnvelope>, EventStoreError> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        batch.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Ownership before expectations: a stream head counts every tenant's
        // events, so a foreign stream must not read as a concurrency conflict.
        let mut heads: HashMap<StreamId, StreamHead> = HashMap::new();
        for event in batch.events() {
            let stream = event.stream_id();
            let mut head = match heads.remove(&stream) {
                Some(head) => head,
                None => load_head(&mut tx, &stream).await?,
            };

            let owner = event.aggregate.resource_owner().as_str();
            match &head.resource_owner {
                Some(existing) if existing != owner => {
                    return Err(EventStoreError::TenantIsolation(format!(
                        "stream {stream} belongs to '{existing}', attempted append for '{owner}'"
                    )));
                }
                Some(_) => {}
                None => head.resource_owner = Some(owner.to_string()),
            }
            heads.insert(stream, head);
        }

        for (stream, expected) in batch.expectations() {
            let current = match heads.get(stream) {
                Some(head) => head.sequence,
                None => {
                    let head = load_head(&mut tx, stream).await?;
                    let sequence = head.sequence;
                    heads.insert(stream.clone(), head);
                    sequence
                }
            };
            if !expected.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "{stream}: expected sequence {expected}, found {current}"
                )));
            }
        }

        let (events, _) = batch.into_parts();
        let mut committed = Vec::with_capacity(events.len());

        for event in events {
            let stream = event.stream_id();
            let mut head = match heads.remove(&stream) {
                Some(head) => head,
                None => load_head(&mut tx, &stream).await?,
            };
            let owner = event.aggregate.resource_owner().as_str();

            let sequence = head.sequence + 1;
            let row = sqlx::query(
                r#"
                INSERT INTO events (
                    event_id,
                    aggregate_type,
                    aggregate_id,
                    resource_owner,
                    event_type,
                    event_version,
                    sequence,
                    payload,
                    editor_user,
                    correlation_id,
                    causation_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING position, creation_date
                "#,
            )
            .bind(event.event_id)
            .bind(event.aggregate.aggregate_type())
            .bind(event.aggregate.id().as_str())
            .bind(owner)
            .bind(&event.event_type)
            .bind(event.event_version as i32)
            .bind(to_db_sequence(sequence)?)
            .bind(&event.payload)
            .bind(event.editor_user.as_str())
            .bind(event.correlation_id.as_deref())
            .bind(event.causation_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EventStoreError::Concurrency(format!(
                        "concurrent append detected: {stream} sequence {sequence} already exists"
                    ))
                } else {
                    map_sqlx_error("insert_event", e)
                }
            })?;

            let position: i64 = row.try_get("position").map_err(|e| map_sqlx_error("insert_event", e))?;
            let creation_date: DateTime<Utc> =
                row.try_get("creation_date").map_err(|e| map_sqlx_error("insert_event", e))?;
            head.sequence = sequence;
            heads.insert(stream.clone(), head);

            committed.push(EventEnvelope {
                event_id: event.event_id,
                aggregate_type: stream.aggregate_type,
                aggregate_id: stream.aggregate_id,
                resource_owner: event.aggregate.resource_owner().clone(),
                event_type: event.event_type,
                event_version: event.event_version,
                sequence,
                position: from_db_u64("position", position)?,
                payload: event.payload,
                creation_date,
                editor_user: event.editor_user,
                correlation_id: event.correlation_id,
                causation_id: event.causation_id,
            });
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        if let Some(last) = committed.last() {
            Span::current().record("committed_position", last.position);
        }
        Ok(committed)
    }

    /// Load every event matching `query`, ordered by `(sequence, position)`.
    #[instrument(skip(self, query), fields(event_count = tracing::field::Empty), err)]
    pub async fn query_events(&self, query: &SearchQuery) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let aggregate_ids: Vec<String> = query.aggregate_ids.iter().map(|id| id.as_str().to_string()).collect();
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_type,
                aggregate_id,
                resource_owner,
                event_type,
                event_version,
                sequence,
                position,
                payload,
                creation_date,
                editor_user,
                correlation_id,
                causation_id
            FROM events
            WHERE ($1::text IS NULL OR resource_owner = $1)
                AND (cardinality($2::text[]) = 0 OR aggregate_type = ANY($2))
                AND (cardinality($3::text[]) = 0 OR aggregate_id = ANY($3))
                AND (cardinality($4::text[]) = 0 OR event_type = ANY($4))
                AND ($5::bigint IS NULL OR sequence > $5)
                AND ($6::bigint IS NULL OR sequence <= $6)
            ORDER BY sequence ASC, position ASC
            LIMIT $7
            "#,
        )
        .bind(query.resource_owner.as_ref().map(|o| o.as_str()))
        .bind(&query.aggregate_types)
        .bind(&aggregate_ids)
        .bind(&query.event_types)
        .bind(query.sequence_greater.map(to_db_sequence).transpose()?)
        .bind(query.sequence_at_most.map(to_db_sequence).transpose()?)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_events", e))?;

        let events = rows.iter().map(envelope_from_row).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("event_count", events.len());
        Ok(events)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn push(&self, batch: AppendBatch) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.append_batch(batch).await
    }

    async fn filter(&self, query: &SearchQuery) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.query_events(query).await
    }
}

/// Head of a stream inside the current transaction.
#[derive(Debug)]
struct StreamHead {
    sequence: u64,
    /// `None` for a stream without events.
    resource_owner: Option<String>,
}

async fn load_head(tx: &mut Transaction<'_, Postgres>, stream: &StreamId) -> Result<StreamHead, EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT sequence, resource_owner
        FROM events
        WHERE aggregate_type = $1 AND aggregate_id = $2
        ORDER BY sequence DESC
        LIMIT 1
        "#,
    )
    .bind(&stream.aggregate_type)
    .bind(stream.aggregate_id.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_head", e))?;

    match row {
        None => Ok(StreamHead {
            sequence: 0,
            resource_owner: None,
        }),
        Some(row) => {
            let sequence: i64 = row.try_get("sequence").map_err(|e| map_sqlx_error("load_head", e))?;
            let owner: String = row.try_get("resource_owner").map_err(|e| map_sqlx_error("load_head", e))?;
            Ok(StreamHead {
                sequence: from_db_u64("sequence", sequence)?,
                resource_owner: Some(owner),
            })
        }
    }
}

fn envelope_from_row(row: &PgRow) -> Result<EventEnvelope, EventStoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_row", e);

    let aggregate_id: String = row.try_get("aggregate_id").map_err(get)?;
    let resource_owner: String = row.try_get("resource_owner").map_err(get)?;
    let editor_user: String = row.try_get("editor_user").map_err(get)?;
    let event_version: i32 = row.try_get("event_version").map_err(get)?;
    let sequence: i64 = row.try_get("sequence").map_err(get)?;
    let position: i64 = row.try_get("position").map_err(get)?;

    Ok(EventEnvelope {
        event_id: row.try_get("event_id").map_err(get)?,
        aggregate_type: row.try_get("aggregate_type").map_err(get)?,
        aggregate_id: aggregate_id.into(),
        resource_owner: resource_owner.into(),
        event_type: row.try_get("event_type").map_err(get)?,
        event_version: u32::try_from(event_version)
            .map_err(|_| EventStoreError::CorruptEvent(format!("negative event_version {event_version}")))?,
        sequence: from_db_u64("sequence", sequence)?,
        position: from_db_u64("position", position)?,
        payload: row.try_get("payload").map_err(get)?,
        creation_date: row.try_get("creation_date").map_err(get)?,
        editor_user: editor_user.into(),
        correlation_id: row.try_get("correlation_id").map_err(get)?,
        causation_id: row.try_get("causation_id").map_err(get)?,
    })
}

fn to_db_sequence(sequence: u64) -> Result<i64, EventStoreError> {
    i64::try_from(sequence).map_err(|_| EventStoreError::InvalidAppend(format!("sequence {sequence} out of range")))
}

fn from_db_u64(column: &str, value: i64) -> Result<u64, EventStoreError> {
    u64::try_from(value).map_err(|_| EventStoreError::CorruptEvent(format!("negative {column} {value}")))
}

/// Map SQLx errors to EventStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23514") | Some("23502") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::StorageUnavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            EventStoreError::CorruptEvent(format!("unreadable row in {operation}: {err}"))
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            EventStoreError::StorageUnavailable(format!("connection pool unavailable in {operation}: {err}"))
        }
        _ => EventStoreError::StorageUnavailable(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_storage_unavailable() {
        let err = map_sqlx_error("query_events", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, EventStoreError::StorageUnavailable(_)));
    }

    #[test]
    fn unreadable_columns_are_corrupt_events() {
        let err = map_sqlx_error("decode_row", sqlx::Error::ColumnNotFound("payload".to_string()));
        assert!(matches!(err, EventStoreError::CorruptEvent(_)));
    }

    #[test]
    fn sequences_round_trip_through_bigint_checks() {
        assert!(to_db_sequence(u64::MAX).is_err());
        assert!(from_db_u64("sequence", -1).is_err());
        assert_eq!(from_db_u64("sequence", 7).unwrap(), 7);
    }
}
