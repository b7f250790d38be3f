//! Event-sourcing substrate shared by every aggregate.
//!
//! - [`Event`]: a closed family of typed events per aggregate, encoded and
//!   decoded by event-type tag
//! - [`EventEnvelope`]: the committed record as persisted by the event store
//! - [`SearchQuery`]: filter criteria for replaying events
//! - [`WriteModel`]: reduction of a filtered stream into current state

pub mod command;
pub mod envelope;
pub mod event;
pub mod query;
pub mod write_model;

pub use command::CommandContext;
pub use envelope::EventEnvelope;
pub use event::{decode_payload, DecodeError, Decoded, Event};
pub use query::SearchQuery;
pub use write_model::{reduce_envelopes, CorruptEvent, WriteModel, WriteModelBase};
