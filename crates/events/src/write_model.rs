//! Write models: current state of an aggregate, rebuilt from its events.
//!
//! A write model is built fresh for every command invocation, fed with the
//! events selected by its own [`WriteModel::query`], used to validate the
//! command, and dropped afterwards. It is never persisted and never shared
//! between concurrent commands.
//!
//! ```text
//! query() → store.filter → reduce_envelopes → guards → new events → push
//!                                                          ↓
//!                                      reduce_envelopes(committed) → post-state
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use warden_core::{AggregateId, ResourceOwner, StreamId};

use crate::event::{DecodeError, Decoded, Event};
use crate::{EventEnvelope, SearchQuery};

/// Bookkeeping every write model carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteModelBase {
    pub aggregate_id: AggregateId,
    pub resource_owner: ResourceOwner,
    /// High-water mark: sequence of the last replayed event.
    pub processed_sequence: u64,
    pub change_date: Option<DateTime<Utc>>,
}

impl WriteModelBase {
    pub fn new(aggregate_id: AggregateId, resource_owner: ResourceOwner) -> Self {
        Self {
            aggregate_id,
            resource_owner,
            processed_sequence: 0,
            change_date: None,
        }
    }
}

/// Reduction of a filtered event stream into in-memory state.
///
/// `reduce` must be:
/// - **deterministic**: replaying the same events yields the same state
/// - **total**: it never fails; events decoded as [`Decoded::Ignored`] never reach it
pub trait WriteModel: Send {
    /// Event family this model understands.
    type Event: Event;

    fn base(&self) -> &WriteModelBase;

    fn base_mut(&mut self) -> &mut WriteModelBase;

    /// Filter criteria identifying the events that make up this model.
    fn query(&self) -> SearchQuery;

    /// Evolve state from one decoded event.
    fn reduce(&mut self, envelope: &EventEnvelope, event: &Self::Event);

    fn processed_sequence(&self) -> u64 {
        self.base().processed_sequence
    }
}

/// Replay aborted on an event whose payload cannot be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("corrupt event at {stream} sequence {sequence}: {source}")]
pub struct CorruptEvent {
    pub stream: StreamId,
    pub sequence: u64,
    #[source]
    pub source: DecodeError,
}

/// Fold envelopes (already in store order) into a write model.
///
/// Unknown event types still advance the high-water mark so the model's
/// sequence keeps matching the stream head. Returns how many events were
/// reduced into state.
pub fn reduce_envelopes<'a, W, I>(model: &mut W, envelopes: I) -> Result<usize, CorruptEvent>
where
    W: WriteModel + ?Sized,
    I: IntoIterator<Item = &'a EventEnvelope>,
{
    let mut reduced = 0;
    for envelope in envelopes {
        match envelope.decode::<W::Event>() {
            Ok(Decoded::Known(event)) => {
                model.reduce(envelope, &event);
                reduced += 1;
            }
            Ok(Decoded::Ignored) => {
                tracing::trace!(
                    event_type = %envelope.event_type,
                    sequence = envelope.sequence,
                    "skipping event unknown to write model"
                );
            }
            Err(source) => {
                return Err(CorruptEvent {
                    stream: envelope.stream_id(),
                    sequence: envelope.sequence,
                    source,
                });
            }
        }

        let base = model.base_mut();
        base.processed_sequence = base.processed_sequence.max(envelope.sequence);
        base.change_date = Some(envelope.creation_date);
    }
    Ok(reduced)
}
