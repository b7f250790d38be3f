use serde::de::DeserializeOwned;
use thiserror::Error;

/// A closed family of typed events for one aggregate.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **tagged** by a stable event-type string persisted next to the payload
/// - **forward compatible**: tags a reader does not know decode to
///   [`Decoded::Ignored`] instead of failing
///
/// Each variant owns the payload for exactly one tag; `encode` writes only that
/// payload, `decode` picks the variant by tag.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event type identifier (e.g. "idp.config.added").
    fn event_type(&self) -> &'static str;

    /// Schema version of this event's payload.
    fn version(&self) -> u32 {
        1
    }

    /// Serialize the payload of this variant.
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error>;

    /// Decode a persisted payload keyed by its event type.
    fn decode(event_type: &str, payload: &[u8]) -> Result<Decoded<Self>, DecodeError>;
}

/// Outcome of decoding a persisted event for a given event family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<E> {
    Known(E),
    /// The tag belongs to another family or to a newer schema; skip it.
    Ignored,
}

impl<E> Decoded<E> {
    pub fn known(self) -> Option<E> {
        match self {
            Decoded::Known(e) => Some(e),
            Decoded::Ignored => None,
        }
    }
}

/// A payload of a known event type could not be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot decode payload of '{event_type}': {reason}")]
pub struct DecodeError {
    pub event_type: String,
    pub reason: String,
}

/// Deserialize a JSON payload. Unknown fields are ignored by serde, so older
/// readers keep working when payloads grow.
pub fn decode_payload<T: DeserializeOwned>(event_type: &str, payload: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(payload).map_err(|e| DecodeError {
        event_type: event_type.to_string(),
        reason: e.to_string(),
    })
}
