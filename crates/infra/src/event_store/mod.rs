//! Append-only event store boundary.
//!
//! This module defines the storage contract for multi-stream, conditionally
//! appended event logs, two backends for it, and the helpers that hydrate write
//! models from any backend.

pub mod in_memory;
pub mod postgres;
pub mod reducer;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use reducer::{append_and_reduce, filter_to_reducer};
pub use r#trait::{AppendBatch, EventStore, EventStoreError, UncommittedEvent};
