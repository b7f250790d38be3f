//! Identity-provider configuration domain module (event-sourced).
//!
//! This crate contains business rules for IDP configurations and the links
//! that depend on them, implemented purely as deterministic domain logic (no
//! IO, no storage). Command handlers in the infrastructure layer hydrate the
//! write models defined here, ask them for events, and push the result.

pub mod commands;
pub mod config;
pub mod events;
pub mod external_idp;
pub mod login_policy;
pub mod write_model;

#[cfg(test)]
mod test_support;

pub use commands::{
    AddIdpConfig, AddOidcConfig, AddUserExternalIdp, ChangeIdpConfig, RemoveIdpConfig,
    RemoveIdpFromLoginPolicy, RemoveUserExternalIdp,
};
pub use config::{
    IdpConfig, IdpConfigState, IdpConfigType, IdpStylingType, OidcIdpConfig, OidcMappingField,
};
pub use events::{IDP_CONFIG_AGGREGATE_TYPE, IdpConfigEvent};
pub use external_idp::{ExternalIdpLink, ExternalIdpLinksWriteModel, USER_AGGREGATE_TYPE, UserExternalIdpEvent};
pub use login_policy::{LOGIN_POLICY_AGGREGATE_TYPE, LoginPolicyEvent, LoginPolicyIdpProvidersWriteModel};
pub use write_model::{IdpConfigChanges, IdpConfigWriteModel};
