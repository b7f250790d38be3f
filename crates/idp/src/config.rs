//! IDP configuration domain object and its value types.

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, CryptoValue, ResourceOwner};

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of an IDP configuration.
///
/// ```text
/// Unspecified ──add──▶ Active ⇄ Inactive ──remove──▶ Removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdpConfigState {
    /// Nothing has been added yet.
    #[default]
    Unspecified,
    Active,
    Inactive,
    /// Terminal.
    Removed,
}

impl IdpConfigState {
    /// Whether the configuration can be addressed by commands at all.
    pub fn exists(self) -> bool {
        !matches!(self, IdpConfigState::Unspecified | IdpConfigState::Removed)
    }
}

impl core::fmt::Display for IdpConfigState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IdpConfigState::Unspecified => write!(f, "Unspecified"),
            IdpConfigState::Active => write!(f, "Active"),
            IdpConfigState::Inactive => write!(f, "Inactive"),
            IdpConfigState::Removed => write!(f, "Removed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdpConfigType {
    #[default]
    Oidc,
    Saml,
}

/// Login button styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdpStylingType {
    #[default]
    Unspecified,
    Google,
}

/// Claim of the upstream token used to fill a local field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OidcMappingField {
    #[default]
    Unspecified,
    PreferredUsername,
    Email,
}

/// OIDC-specific part of a configuration. The client secret is only ever
/// held in protected form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcIdpConfig {
    pub client_id: String,
    pub client_secret: CryptoValue,
    pub issuer: String,
    pub scopes: Vec<String>,
    pub idp_display_name_mapping: OidcMappingField,
    pub username_mapping: OidcMappingField,
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain object
// ─────────────────────────────────────────────────────────────────────────────

/// Authoritative post-command view of an IDP configuration, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpConfig {
    pub idp_config_id: AggregateId,
    pub resource_owner: ResourceOwner,
    /// Stream sequence this view reflects.
    pub sequence: u64,
    pub name: String,
    pub idp_type: IdpConfigType,
    pub styling_type: IdpStylingType,
    pub state: IdpConfigState,
    pub oidc_config: Option<OidcIdpConfig>,
}
