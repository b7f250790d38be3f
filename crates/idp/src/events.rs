//! Events of the `idp_config` aggregate.

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, CryptoValue};
use warden_events::{decode_payload, DecodeError, Decoded, Event};

use crate::config::{IdpConfigType, IdpStylingType, OidcMappingField};

pub const IDP_CONFIG_AGGREGATE_TYPE: &str = "idp_config";

pub const IDP_CONFIG_ADDED: &str = "idp.config.added";
pub const IDP_OIDC_CONFIG_ADDED: &str = "idp.oidc.config.added";
pub const IDP_CONFIG_CHANGED: &str = "idp.config.changed";
pub const IDP_CONFIG_DEACTIVATED: &str = "idp.config.deactivated";
pub const IDP_CONFIG_REACTIVATED: &str = "idp.config.reactivated";
pub const IDP_CONFIG_REMOVED: &str = "idp.config.removed";

/// Event: IdpConfigAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigAdded {
    pub idp_config_id: AggregateId,
    pub name: String,
    pub idp_type: IdpConfigType,
    #[serde(default)]
    pub styling_type: IdpStylingType,
}

/// Event: IdpOidcConfigAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpOidcConfigAdded {
    pub idp_config_id: AggregateId,
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub issuer: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub idp_display_name_mapping: OidcMappingField,
    #[serde(default)]
    pub username_mapping: OidcMappingField,
}

/// Event: IdpConfigChanged. Only the fields that changed are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigChanged {
    pub idp_config_id: AggregateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styling_type: Option<IdpStylingType>,
}

/// Event: IdpConfigDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigDeactivated {
    pub idp_config_id: AggregateId,
}

/// Event: IdpConfigReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigReactivated {
    pub idp_config_id: AggregateId,
}

/// Event: IdpConfigRemoved. Carries the name so unique-name constraints can be released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfigRemoved {
    pub idp_config_id: AggregateId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdpConfigEvent {
    Added(IdpConfigAdded),
    OidcConfigAdded(IdpOidcConfigAdded),
    Changed(IdpConfigChanged),
    Deactivated(IdpConfigDeactivated),
    Reactivated(IdpConfigReactivated),
    Removed(IdpConfigRemoved),
}

impl Event for IdpConfigEvent {
    fn event_type(&self) -> &'static str {
        match self {
            IdpConfigEvent::Added(_) => IDP_CONFIG_ADDED,
            IdpConfigEvent::OidcConfigAdded(_) => IDP_OIDC_CONFIG_ADDED,
            IdpConfigEvent::Changed(_) => IDP_CONFIG_CHANGED,
            IdpConfigEvent::Deactivated(_) => IDP_CONFIG_DEACTIVATED,
            IdpConfigEvent::Reactivated(_) => IDP_CONFIG_REACTIVATED,
            IdpConfigEvent::Removed(_) => IDP_CONFIG_REMOVED,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            IdpConfigEvent::Added(e) => serde_json::to_vec(e),
            IdpConfigEvent::OidcConfigAdded(e) => serde_json::to_vec(e),
            IdpConfigEvent::Changed(e) => serde_json::to_vec(e),
            IdpConfigEvent::Deactivated(e) => serde_json::to_vec(e),
            IdpConfigEvent::Reactivated(e) => serde_json::to_vec(e),
            IdpConfigEvent::Removed(e) => serde_json::to_vec(e),
        }
    }

    fn decode(event_type: &str, payload: &[u8]) -> Result<Decoded<Self>, DecodeError> {
        let event = match event_type {
            IDP_CONFIG_ADDED => IdpConfigEvent::Added(decode_payload(event_type, payload)?),
            IDP_OIDC_CONFIG_ADDED => {
                IdpConfigEvent::OidcConfigAdded(decode_payload(event_type, payload)?)
            }
            IDP_CONFIG_CHANGED => IdpConfigEvent::Changed(decode_payload(event_type, payload)?),
            IDP_CONFIG_DEACTIVATED => {
                IdpConfigEvent::Deactivated(decode_payload(event_type, payload)?)
            }
            IDP_CONFIG_REACTIVATED => {
                IdpConfigEvent::Reactivated(decode_payload(event_type, payload)?)
            }
            IDP_CONFIG_REMOVED => IdpConfigEvent::Removed(decode_payload(event_type, payload)?),
            _ => return Ok(Decoded::Ignored),
        };
        Ok(Decoded::Known(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tags_are_ignored_not_rejected() {
        let decoded = IdpConfigEvent::decode("idp.config.renamed_in_future", b"not even json").unwrap();
        assert_eq!(decoded, Decoded::Ignored);
    }

    #[test]
    fn malformed_payload_of_known_tag_is_an_error() {
        let err = IdpConfigEvent::decode(IDP_CONFIG_ADDED, b"{\"name\":").unwrap_err();
        assert_eq!(err.event_type, IDP_CONFIG_ADDED);
    }

    #[test]
    fn older_readers_ignore_new_payload_fields() {
        let payload = br#"{"idp_config_id":"idp-1","name":"corp","idp_type":"oidc","logo":"x.png"}"#;
        let decoded = IdpConfigEvent::decode(IDP_CONFIG_ADDED, payload).unwrap();
        match decoded {
            Decoded::Known(IdpConfigEvent::Added(e)) => {
                assert_eq!(e.name, "corp");
                assert_eq!(e.styling_type, IdpStylingType::Unspecified);
            }
            other => panic!("Expected IdpConfigAdded, got {other:?}"),
        }
    }

    #[test]
    fn changed_event_omits_untouched_fields() {
        let event = IdpConfigEvent::Changed(IdpConfigChanged {
            idp_config_id: "idp-1".into(),
            name: Some("corp-v2".to_string()),
            styling_type: None,
        });
        let json = String::from_utf8(event.encode().unwrap()).unwrap();
        assert!(json.contains("corp-v2"));
        assert!(!json.contains("styling_type"));
    }
}
