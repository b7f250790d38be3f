//! Command handlers (application-level orchestration).
//!
//! Every handler follows the same pipeline:
//!
//! ```text
//! Command + CommandContext
//!   ↓
//! 1. Hydrate write model(s) from the store (filter_to_reducer)
//!   ↓
//! 2. Ask the write model for events (pure guards, may reject)
//!   ↓
//! 3. Stage events + expectations into one AppendBatch
//!   ↓
//! 4. Push (all-or-nothing, optimistic concurrency)
//!   ↓
//! 5. Fold committed events back into the model (append_and_reduce)
//! ```
//!
//! Business errors are returned before anything is pushed. Store errors are
//! passed through with their kind intact; nothing here retries.

use std::sync::Arc;

use thiserror::Error;

use warden_core::{AggregateRef, DomainError, IdGenerator};
use warden_events::{CommandContext, Event, EventEnvelope, WriteModel};

use crate::crypto::{CryptoError, SecretCrypto};
use crate::event_store::{filter_to_reducer, AppendBatch, EventStore, EventStoreError, UncommittedEvent};

pub mod external_idp;
pub mod idp_config;
pub mod login_policy;

/// Outward error taxonomy of every command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Malformed or missing command input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced aggregate does not exist or is already removed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Lifecycle guard violation, or the command would change nothing.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Another command committed first. Re-read and retry.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A persisted event of the aggregate cannot be read.
    #[error("corrupt event: {0}")]
    CorruptEvent(String),

    /// Secret service failure, unchanged.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Store invariant violated (tenant isolation, malformed batch).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Whether re-running the whole command may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, CommandError::ConcurrencyConflict(_) | CommandError::StorageUnavailable(_))
    }
}

impl From<DomainError> for CommandError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidArgument(msg) | DomainError::InvalidId(msg) => CommandError::InvalidArgument(msg),
            DomainError::NotFound(msg) => CommandError::NotFound(msg),
            DomainError::PreconditionFailed(msg) => CommandError::PreconditionFailed(msg),
        }
    }
}

impl From<EventStoreError> for CommandError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => CommandError::ConcurrencyConflict(msg),
            EventStoreError::StorageUnavailable(msg) => CommandError::StorageUnavailable(msg),
            EventStoreError::CorruptEvent(msg) => CommandError::CorruptEvent(msg),
            EventStoreError::TenantIsolation(msg) | EventStoreError::InvalidAppend(msg) => {
                CommandError::Internal(msg)
            }
        }
    }
}

/// Entry points for every command, one method per use case.
///
/// Holds no aggregate state: each invocation rehydrates what it needs, so
/// one `CommandSide` can serve any number of concurrent commands.
pub struct CommandSide<S> {
    store: S,
    id_generator: Arc<dyn IdGenerator>,
    secret_crypto: Arc<dyn SecretCrypto>,
}

impl<S> CommandSide<S>
where
    S: EventStore,
{
    pub fn new(store: S, id_generator: Arc<dyn IdGenerator>, secret_crypto: Arc<dyn SecretCrypto>) -> Self {
        Self {
            store,
            id_generator,
            secret_crypto,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn load<W: WriteModel>(&self, mut model: W) -> Result<W, CommandError> {
        filter_to_reducer(&self.store, &mut model).await?;
        Ok(model)
    }

    async fn push(&self, batch: AppendBatch) -> Result<Vec<EventEnvelope>, CommandError> {
        let event_count = batch.len();
        match self.store.push(batch).await {
            Ok(committed) => {
                if let Some(last) = committed.last() {
                    tracing::debug!(
                        event_count,
                        aggregate_id = %last.aggregate_id,
                        sequence = last.sequence,
                        position = last.position,
                        "events committed"
                    );
                }
                Ok(committed)
            }
            Err(EventStoreError::Concurrency(msg)) => {
                tracing::warn!(event_count, reason = %msg, "push rejected by concurrent modification");
                Err(CommandError::ConcurrencyConflict(msg))
            }
            Err(err) => {
                tracing::error!(event_count, error = %err, "push failed");
                Err(err.into())
            }
        }
    }
}

/// Encode `event` for `aggregate` and append it to `batch`.
fn stage<E: Event>(
    batch: &mut AppendBatch,
    ctx: &CommandContext,
    aggregate: &AggregateRef,
    event: &E,
) -> Result<(), CommandError> {
    batch.push(UncommittedEvent::from_typed(ctx, aggregate, event)?);
    Ok(())
}

/// Stage `event` and condition the batch on `aggregate`'s observed sequence.
fn stage_exact<E: Event>(
    batch: &mut AppendBatch,
    ctx: &CommandContext,
    aggregate: &AggregateRef,
    event: &E,
) -> Result<(), CommandError> {
    stage(batch, ctx, aggregate, event)?;
    expect_unchanged(batch, aggregate);
    Ok(())
}

/// Condition the batch on `aggregate` without appending to it.
fn expect_unchanged(batch: &mut AppendBatch, aggregate: &AggregateRef) {
    batch.expect(aggregate.stream_id(), aggregate.expected_sequence());
}
