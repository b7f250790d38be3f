//! Command payloads. The acting organization and actor come from the
//! `CommandContext`, never from the payload.

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, DomainError, DomainResult};

use crate::config::{IdpConfigType, IdpStylingType, OidcMappingField};

/// Command: AddIdpConfig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddIdpConfig {
    pub name: String,
    pub idp_type: IdpConfigType,
    pub styling_type: IdpStylingType,
    pub oidc_config: Option<AddOidcConfig>,
}

/// OIDC part of [`AddIdpConfig`]; carries the client secret in plain text.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOidcConfig {
    pub client_id: String,
    pub client_secret: String,
    pub issuer: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub idp_display_name_mapping: OidcMappingField,
    #[serde(default)]
    pub username_mapping: OidcMappingField,
}

impl core::fmt::Debug for AddOidcConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddOidcConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("scopes", &self.scopes)
            .field("idp_display_name_mapping", &self.idp_display_name_mapping)
            .field("username_mapping", &self.username_mapping)
            .finish()
    }
}

impl AddIdpConfig {
    /// Validate the request and hand out the mandatory OIDC part.
    pub fn validate(&self) -> DomainResult<&AddOidcConfig> {
        let oidc = self
            .oidc_config
            .as_ref()
            .ok_or_else(|| DomainError::invalid_argument("oidc configuration is not set"))?;
        if self.name.trim().is_empty() {
            return Err(DomainError::invalid_argument("name cannot be empty"));
        }
        if oidc.client_id.trim().is_empty() {
            return Err(DomainError::invalid_argument("client id cannot be empty"));
        }
        if oidc.issuer.trim().is_empty() {
            return Err(DomainError::invalid_argument("issuer cannot be empty"));
        }
        Ok(oidc)
    }
}

/// Command: ChangeIdpConfig. Only `name` and `styling_type` are changeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeIdpConfig {
    pub idp_config_id: AggregateId,
    pub name: String,
    pub styling_type: IdpStylingType,
}

/// Command: RemoveIdpConfig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveIdpConfig {
    pub idp_config_id: AggregateId,
    /// Also unlink the configuration from the login policy and from every
    /// user that signs in through it, in the same atomic batch.
    pub cascade_remove_providers: bool,
}

/// Command: RemoveIdpFromLoginPolicy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveIdpFromLoginPolicy {
    pub idp_config_id: AggregateId,
    pub cascade_remove_external_idps: bool,
}

/// Command: AddUserExternalIdp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUserExternalIdp {
    pub user_id: AggregateId,
    pub idp_config_id: AggregateId,
    pub external_user_id: String,
    pub display_name: String,
}

impl AddUserExternalIdp {
    pub fn validate(&self) -> DomainResult<()> {
        if self.external_user_id.trim().is_empty() {
            return Err(DomainError::invalid_argument("external user id cannot be empty"));
        }
        Ok(())
    }
}

/// Command: RemoveUserExternalIdp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveUserExternalIdp {
    pub user_id: AggregateId,
    pub idp_config_id: AggregateId,
    pub external_user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oidc() -> AddOidcConfig {
        AddOidcConfig {
            client_id: "abc".to_string(),
            client_secret: "s3cr3t".to_string(),
            issuer: "https://idp.example.com".to_string(),
            scopes: vec!["openid".to_string()],
            idp_display_name_mapping: OidcMappingField::Unspecified,
            username_mapping: OidcMappingField::Email,
        }
    }

    fn add(oidc_config: Option<AddOidcConfig>) -> AddIdpConfig {
        AddIdpConfig {
            name: "corp-oidc".to_string(),
            idp_type: IdpConfigType::Oidc,
            styling_type: IdpStylingType::Unspecified,
            oidc_config,
        }
    }

    #[test]
    fn add_requires_oidc_configuration() {
        let err = add(None).validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(msg) if msg.contains("oidc")));
    }

    #[test]
    fn add_rejects_blank_issuer_and_client_id() {
        let mut cfg = oidc();
        cfg.issuer = " ".to_string();
        assert!(add(Some(cfg)).validate().is_err());

        let mut cfg = oidc();
        cfg.client_id.clear();
        assert!(add(Some(cfg)).validate().is_err());
    }

    #[test]
    fn debug_output_never_contains_the_secret() {
        let rendered = format!("{:?}", add(Some(oidc())));
        assert!(!rendered.contains("s3cr3t"));
    }
}
