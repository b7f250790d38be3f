//! Write model of one IDP configuration.

use warden_core::{AggregateId, AggregateRef, CryptoValue, DomainError, DomainResult, ResourceOwner};
use warden_events::{EventEnvelope, SearchQuery, WriteModel, WriteModelBase};

use crate::commands::{AddIdpConfig, AddOidcConfig, ChangeIdpConfig};
use crate::config::{IdpConfig, IdpConfigState, IdpConfigType, IdpStylingType, OidcIdpConfig};
use crate::events::{
    IdpConfigAdded, IdpConfigChanged, IdpConfigDeactivated, IdpConfigEvent, IdpConfigReactivated,
    IdpConfigRemoved, IdpOidcConfigAdded, IDP_CONFIG_AGGREGATE_TYPE,
};

/// Current state of one IDP configuration, replayed from its own stream.
///
/// Decision methods (`*_event`) check the lifecycle guards against the
/// replayed state and return the event to push; they never touch the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpConfigWriteModel {
    base: WriteModelBase,
    pub name: String,
    pub idp_type: IdpConfigType,
    pub styling_type: IdpStylingType,
    pub state: IdpConfigState,
    pub oidc_config: Option<OidcIdpConfig>,
}

/// Field-by-field difference between a change request and the current state.
/// A field is `Some` only when the requested value differs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdpConfigChanges {
    pub name: Option<String>,
    pub styling_type: Option<IdpStylingType>,
}

impl IdpConfigChanges {
    pub fn has_changed(&self) -> bool {
        self.name.is_some() || self.styling_type.is_some()
    }
}

impl IdpConfigWriteModel {
    pub fn new(idp_config_id: AggregateId, resource_owner: ResourceOwner) -> Self {
        Self {
            base: WriteModelBase::new(idp_config_id, resource_owner),
            name: String::new(),
            idp_type: IdpConfigType::default(),
            styling_type: IdpStylingType::default(),
            state: IdpConfigState::Unspecified,
            oidc_config: None,
        }
    }

    pub fn idp_config_id(&self) -> &AggregateId {
        &self.base.aggregate_id
    }

    /// Reference to the aggregate at the replayed sequence.
    pub fn aggregate(&self) -> AggregateRef {
        AggregateRef::new(
            IDP_CONFIG_AGGREGATE_TYPE,
            self.base.aggregate_id.clone(),
            self.base.resource_owner.clone(),
        )
        .at_sequence(self.base.processed_sequence)
    }

    /// The two events that create a configuration: the generic part first,
    /// then the OIDC part. The client secret must already be protected.
    pub fn added_events(
        &self,
        cmd: &AddIdpConfig,
        oidc: &AddOidcConfig,
        client_secret: CryptoValue,
    ) -> DomainResult<Vec<IdpConfigEvent>> {
        if self.state != IdpConfigState::Unspecified {
            return Err(DomainError::precondition(format!(
                "idp config {} already exists",
                self.idp_config_id()
            )));
        }
        let id = self.idp_config_id().clone();
        Ok(vec![
            IdpConfigEvent::Added(IdpConfigAdded {
                idp_config_id: id.clone(),
                name: cmd.name.trim().to_string(),
                idp_type: cmd.idp_type,
                styling_type: cmd.styling_type,
            }),
            IdpConfigEvent::OidcConfigAdded(IdpOidcConfigAdded {
                idp_config_id: id,
                client_id: oidc.client_id.clone(),
                client_secret,
                issuer: oidc.issuer.clone(),
                scopes: oidc.scopes.clone(),
                idp_display_name_mapping: oidc.idp_display_name_mapping,
                username_mapping: oidc.username_mapping,
            }),
        ])
    }

    /// Compare the changeable fields explicitly; nothing else is considered.
    pub fn changes(&self, name: &str, styling_type: IdpStylingType) -> IdpConfigChanges {
        let name = name.trim();
        IdpConfigChanges {
            name: (self.name != name).then(|| name.to_string()),
            styling_type: (self.styling_type != styling_type).then_some(styling_type),
        }
    }

    pub fn changed_event(&self, cmd: &ChangeIdpConfig) -> DomainResult<IdpConfigEvent> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_argument("name cannot be empty"));
        }
        self.ensure_exists()?;

        let changes = self.changes(&cmd.name, cmd.styling_type);
        if !changes.has_changed() {
            return Err(DomainError::precondition("idp config has not changed"));
        }
        Ok(IdpConfigEvent::Changed(IdpConfigChanged {
            idp_config_id: self.idp_config_id().clone(),
            name: changes.name,
            styling_type: changes.styling_type,
        }))
    }

    pub fn deactivate_event(&self) -> DomainResult<IdpConfigEvent> {
        if self.state != IdpConfigState::Active {
            return Err(DomainError::precondition(format!(
                "idp config is not active (state: {})",
                self.state
            )));
        }
        Ok(IdpConfigEvent::Deactivated(IdpConfigDeactivated {
            idp_config_id: self.idp_config_id().clone(),
        }))
    }

    pub fn reactivate_event(&self) -> DomainResult<IdpConfigEvent> {
        if self.state != IdpConfigState::Inactive {
            return Err(DomainError::precondition(format!(
                "idp config is not inactive (state: {})",
                self.state
            )));
        }
        Ok(IdpConfigEvent::Reactivated(IdpConfigReactivated {
            idp_config_id: self.idp_config_id().clone(),
        }))
    }

    /// Removal is only allowed from `Inactive`.
    pub fn remove_event(&self) -> DomainResult<IdpConfigEvent> {
        self.ensure_exists()?;
        if self.state != IdpConfigState::Inactive {
            return Err(DomainError::precondition(format!(
                "idp config must be deactivated before removal (state: {})",
                self.state
            )));
        }
        Ok(IdpConfigEvent::Removed(IdpConfigRemoved {
            idp_config_id: self.idp_config_id().clone(),
            name: self.name.clone(),
        }))
    }

    pub fn ensure_exists(&self) -> DomainResult<()> {
        if !self.state.exists() {
            return Err(DomainError::not_found(format!(
                "idp config {} does not exist",
                self.idp_config_id()
            )));
        }
        Ok(())
    }

    pub fn to_idp_config(&self) -> IdpConfig {
        IdpConfig {
            idp_config_id: self.base.aggregate_id.clone(),
            resource_owner: self.base.resource_owner.clone(),
            sequence: self.base.processed_sequence,
            name: self.name.clone(),
            idp_type: self.idp_type,
            styling_type: self.styling_type,
            state: self.state,
            oidc_config: self.oidc_config.clone(),
        }
    }
}

impl WriteModel for IdpConfigWriteModel {
    type Event = IdpConfigEvent;

    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::new()
            .resource_owner(self.base.resource_owner.clone())
            .aggregate_type(IDP_CONFIG_AGGREGATE_TYPE)
            .aggregate_id(self.base.aggregate_id.clone())
    }

    fn reduce(&mut self, _envelope: &EventEnvelope, event: &IdpConfigEvent) {
        match event {
            IdpConfigEvent::Added(e) => {
                self.name = e.name.clone();
                self.idp_type = e.idp_type;
                self.styling_type = e.styling_type;
                self.state = IdpConfigState::Active;
            }
            IdpConfigEvent::OidcConfigAdded(e) => {
                self.oidc_config = Some(OidcIdpConfig {
                    client_id: e.client_id.clone(),
                    client_secret: e.client_secret.clone(),
                    issuer: e.issuer.clone(),
                    scopes: e.scopes.clone(),
                    idp_display_name_mapping: e.idp_display_name_mapping,
                    username_mapping: e.username_mapping,
                });
            }
            IdpConfigEvent::Changed(e) => {
                if let Some(name) = &e.name {
                    self.name = name.clone();
                }
                if let Some(styling_type) = e.styling_type {
                    self.styling_type = styling_type;
                }
            }
            IdpConfigEvent::Deactivated(_) => self.state = IdpConfigState::Inactive,
            IdpConfigEvent::Reactivated(_) => self.state = IdpConfigState::Active,
            IdpConfigEvent::Removed(_) => self.state = IdpConfigState::Removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use warden_core::CryptoType;
    use warden_events::reduce_envelopes;

    fn secret() -> CryptoValue {
        CryptoValue {
            crypto_type: CryptoType::Hash,
            algorithm: "sha256".to_string(),
            key_id: "test".to_string(),
            crypted: b"digest".to_vec(),
        }
    }

    fn envelope(event: &IdpConfigEvent, sequence: u64) -> EventEnvelope {
        crate::test_support::envelope(IDP_CONFIG_AGGREGATE_TYPE, "idp-1", event, sequence)
    }

    fn add_command() -> AddIdpConfig {
        AddIdpConfig {
            name: "corp-oidc".to_string(),
            idp_type: IdpConfigType::Oidc,
            styling_type: IdpStylingType::Unspecified,
            oidc_config: Some(AddOidcConfig {
                client_id: "abc".to_string(),
                client_secret: "s3cr3t".to_string(),
                issuer: "https://idp.example.com".to_string(),
                scopes: vec!["openid".to_string()],
                idp_display_name_mapping: Default::default(),
                username_mapping: Default::default(),
            }),
        }
    }

    fn replay(events: &[IdpConfigEvent]) -> IdpConfigWriteModel {
        let envelopes: Vec<_> = events
            .iter()
            .enumerate()
            .map(|(i, e)| envelope(e, i as u64 + 1))
            .collect();
        let mut model = IdpConfigWriteModel::new("idp-1".into(), "org-1".into());
        reduce_envelopes(&mut model, &envelopes).unwrap();
        model
    }

    fn added() -> Vec<IdpConfigEvent> {
        let model = IdpConfigWriteModel::new("idp-1".into(), "org-1".into());
        let cmd = add_command();
        let oidc = cmd.validate().unwrap();
        model.added_events(&cmd, oidc, secret()).unwrap()
    }

    fn deactivated() -> IdpConfigEvent {
        IdpConfigEvent::Deactivated(IdpConfigDeactivated {
            idp_config_id: "idp-1".into(),
        })
    }

    #[test]
    fn added_events_produce_active_config() {
        let events = added();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], IdpConfigEvent::Added(_)));
        assert!(matches!(events[1], IdpConfigEvent::OidcConfigAdded(_)));

        let model = replay(&events);
        assert_eq!(model.state, IdpConfigState::Active);
        assert_eq!(model.name, "corp-oidc");
        assert_eq!(model.processed_sequence(), 2);
        assert_eq!(model.oidc_config.as_ref().unwrap().client_id, "abc");
    }

    #[test]
    fn identical_change_is_rejected() {
        let model = replay(&added());
        let err = model
            .changed_event(&ChangeIdpConfig {
                idp_config_id: "idp-1".into(),
                name: "corp-oidc".to_string(),
                styling_type: IdpStylingType::Unspecified,
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::PreconditionFailed(_)));
    }

    #[test]
    fn change_carries_only_differing_fields() {
        let model = replay(&added());
        let event = model
            .changed_event(&ChangeIdpConfig {
                idp_config_id: "idp-1".into(),
                name: "corp-oidc".to_string(),
                styling_type: IdpStylingType::Google,
            })
            .unwrap();
        match event {
            IdpConfigEvent::Changed(e) => {
                assert_eq!(e.name, None);
                assert_eq!(e.styling_type, Some(IdpStylingType::Google));
            }
            other => panic!("Expected IdpConfigChanged, got {other:?}"),
        }
    }

    #[test]
    fn change_of_missing_config_is_not_found() {
        let model = IdpConfigWriteModel::new("idp-1".into(), "org-1".into());
        let err = model
            .changed_event(&ChangeIdpConfig {
                idp_config_id: "idp-1".into(),
                name: "x".to_string(),
                styling_type: IdpStylingType::Unspecified,
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn lifecycle_guards() {
        let active = replay(&added());
        assert!(active.reactivate_event().is_err());
        assert!(matches!(active.remove_event(), Err(DomainError::PreconditionFailed(_))));

        let mut events = added();
        events.push(deactivated());
        let inactive = replay(&events);
        assert!(matches!(inactive.deactivate_event(), Err(DomainError::PreconditionFailed(_))));
        assert!(inactive.reactivate_event().is_ok());

        let removal = inactive.remove_event().unwrap();
        events.push(removal);
        let removed = replay(&events);
        assert_eq!(removed.state, IdpConfigState::Removed);
        assert!(matches!(removed.deactivate_event(), Err(DomainError::PreconditionFailed(_))));
        assert!(matches!(removed.remove_event(), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn removed_event_carries_name() {
        let mut events = added();
        events.push(deactivated());
        match replay(&events).remove_event().unwrap() {
            IdpConfigEvent::Removed(e) => assert_eq!(e.name, "corp-oidc"),
            other => panic!("Expected IdpConfigRemoved, got {other:?}"),
        }
    }

    #[test]
    fn foreign_event_types_advance_sequence_only() {
        let mut envelopes: Vec<_> = added().iter().enumerate().map(|(i, e)| envelope(e, i as u64 + 1)).collect();
        let mut foreign = envelopes[0].clone();
        foreign.event_type = "idp.config.logo.added".to_string();
        foreign.sequence = 3;
        envelopes.push(foreign);

        let mut model = IdpConfigWriteModel::new("idp-1".into(), "org-1".into());
        let reduced = reduce_envelopes(&mut model, &envelopes).unwrap();
        assert_eq!(reduced, 2);
        assert_eq!(model.processed_sequence(), 3);
        assert_eq!(model.state, IdpConfigState::Active);
    }

    fn arb_event() -> impl Strategy<Value = IdpConfigEvent> {
        let id = || AggregateId::from("idp-1");
        prop_oneof![
            "[a-z]{1,8}".prop_map(move |name| IdpConfigEvent::Added(IdpConfigAdded {
                idp_config_id: id(),
                name,
                idp_type: IdpConfigType::Oidc,
                styling_type: IdpStylingType::Unspecified,
            })),
            (proptest::option::of("[a-z]{1,8}"), any::<bool>()).prop_map(move |(name, google)| {
                IdpConfigEvent::Changed(IdpConfigChanged {
                    idp_config_id: id(),
                    name,
                    styling_type: google.then_some(IdpStylingType::Google),
                })
            }),
            Just(IdpConfigEvent::Deactivated(IdpConfigDeactivated { idp_config_id: id() })),
            Just(IdpConfigEvent::Reactivated(IdpConfigReactivated { idp_config_id: id() })),
            "[a-z]{1,8}".prop_map(move |name| IdpConfigEvent::Removed(IdpConfigRemoved {
                idp_config_id: id(),
                name,
            })),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn replay_is_deterministic(events in proptest::collection::vec(arb_event(), 0..24)) {
            let envelopes: Vec<_> = events.iter().enumerate().map(|(i, e)| envelope(e, i as u64 + 1)).collect();

            let mut first = IdpConfigWriteModel::new("idp-1".into(), "org-1".into());
            let mut second = IdpConfigWriteModel::new("idp-1".into(), "org-1".into());
            reduce_envelopes(&mut first, &envelopes).unwrap();
            reduce_envelopes(&mut second, &envelopes).unwrap();

            // change_date depends only on the envelopes, so the whole model must match.
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.processed_sequence(), events.len() as u64);
        }
    }
}
