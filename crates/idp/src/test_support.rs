//! Fixtures shared by the unit tests of this crate.

use chrono::Utc;
use uuid::Uuid;

use warden_events::{Event, EventEnvelope};

/// `event` as committed at `sequence` in stream `(aggregate_type, aggregate_id)` of `org-1`.
pub(crate) fn envelope<E: Event>(aggregate_type: &str, aggregate_id: &str, event: &E, sequence: u64) -> EventEnvelope {
    EventEnvelope {
        event_id: Uuid::now_v7(),
        aggregate_type: aggregate_type.to_string(),
        aggregate_id: aggregate_id.into(),
        resource_owner: "org-1".into(),
        event_type: event.event_type().to_string(),
        event_version: event.version(),
        sequence,
        position: sequence,
        payload: event.encode().unwrap(),
        creation_date: Utc::now(),
        editor_user: "tester".into(),
        correlation_id: None,
        causation_id: None,
    }
}
