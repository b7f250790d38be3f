//! Aggregate identity and optimistic concurrency primitives.

use serde::{Deserialize, Serialize};

use crate::id::{AggregateId, ResourceOwner};

/// Partition key of an event stream: one stream per `(aggregate type, aggregate id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
}

impl StreamId {
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id,
        }
    }
}

impl core::fmt::Display for StreamId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// Reference to an aggregate, embedded by value in every event and write model.
///
/// `sequence` is the highest sequence the holder has observed for the stream.
/// Command handlers push new events conditioned on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateRef {
    aggregate_type: String,
    id: AggregateId,
    resource_owner: ResourceOwner,
    sequence: u64,
}

impl AggregateRef {
    /// Reference a (possibly not yet existing) aggregate at sequence 0.
    pub fn new(
        aggregate_type: impl Into<String>,
        id: AggregateId,
        resource_owner: ResourceOwner,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id,
            resource_owner,
            sequence: 0,
        }
    }

    pub fn at_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    pub fn resource_owner(&self) -> &ResourceOwner {
        &self.resource_owner
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn stream_id(&self) -> StreamId {
        StreamId::new(self.aggregate_type.clone(), self.id.clone())
    }

    /// Expectation that nobody appended to the stream since this reference was taken.
    pub fn expected_sequence(&self) -> ExpectedSequence {
        ExpectedSequence::Exact(self.sequence)
    }
}

/// Optimistic concurrency expectation for a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedSequence {
    /// Skip checking (new aggregates with freshly generated ids, cascade targets).
    Any,
    /// Require the stream's highest sequence to be exactly this value (0 = empty stream).
    Exact(u64),
}

impl ExpectedSequence {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedSequence::Any => true,
            ExpectedSequence::Exact(v) => v == actual,
        }
    }
}

impl core::fmt::Display for ExpectedSequence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExpectedSequence::Any => f.write_str("any"),
            ExpectedSequence::Exact(v) => write!(f, "{v}"),
        }
    }
}
