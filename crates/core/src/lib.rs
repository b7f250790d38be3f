//! `warden-core`: foundation building blocks for the identity backend.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, aggregate references, optimistic concurrency expectations and
//! the domain error model.

pub mod aggregate;
pub mod crypto;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRef, ExpectedSequence, StreamId};
pub use crypto::{CryptoType, CryptoValue};
pub use error::{DomainError, DomainResult};
pub use id::{ActorId, AggregateId, IdGenerator, ResourceOwner, UuidV7Generator};
