//! Hydration of write models from the store.

use warden_events::{reduce_envelopes, CorruptEvent, EventEnvelope, WriteModel};

use super::r#trait::{EventStore, EventStoreError};

impl From<CorruptEvent> for EventStoreError {
    fn from(value: CorruptEvent) -> Self {
        EventStoreError::CorruptEvent(value.to_string())
    }
}

/// Replay everything matched by the model's own query into it.
///
/// Always reads from the store; nothing is cached between calls.
pub async fn filter_to_reducer<S, W>(store: &S, model: &mut W) -> Result<(), EventStoreError>
where
    S: EventStore + ?Sized,
    W: WriteModel,
{
    let query = model.query();
    let events = store.filter(&query).await?;
    if let Err(corrupt) = reduce_envelopes(model, &events) {
        tracing::error!(
            stream = %corrupt.stream,
            sequence = corrupt.sequence,
            error = %corrupt.source,
            "replay aborted on corrupt event"
        );
        return Err(corrupt.into());
    }
    Ok(())
}

/// Fold freshly committed events back into the model that produced them,
/// without another store round-trip. Events the model's query would not have
/// selected (other aggregates of a cascade batch) are skipped.
pub fn append_and_reduce<W>(model: &mut W, committed: &[EventEnvelope]) -> Result<(), EventStoreError>
where
    W: WriteModel,
{
    let query = model.query();
    reduce_envelopes(model, committed.iter().filter(|e| query.matches(e)))?;
    Ok(())
}
