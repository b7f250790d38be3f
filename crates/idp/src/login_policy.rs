//! IDP providers linked into an organization's login policy.
//!
//! The login policy is its own aggregate (id = organization id). It references
//! IDP configurations by id only, so removing a configuration has to look the
//! link up explicitly and cascade.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, AggregateRef, DomainError, DomainResult, ResourceOwner};
use warden_events::{decode_payload, DecodeError, Decoded, Event, EventEnvelope, SearchQuery, WriteModel, WriteModelBase};

pub const LOGIN_POLICY_AGGREGATE_TYPE: &str = "login_policy";

pub const IDP_PROVIDER_ADDED: &str = "login_policy.idp_provider.added";
pub const IDP_PROVIDER_REMOVED: &str = "login_policy.idp_provider.removed";
pub const IDP_PROVIDER_CASCADE_REMOVED: &str = "login_policy.idp_provider.cascade_removed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpProviderRef {
    pub idp_config_id: AggregateId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPolicyEvent {
    IdpProviderAdded(IdpProviderRef),
    IdpProviderRemoved(IdpProviderRef),
    /// Removed because the IDP configuration itself was removed.
    IdpProviderCascadeRemoved(IdpProviderRef),
}

impl Event for LoginPolicyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoginPolicyEvent::IdpProviderAdded(_) => IDP_PROVIDER_ADDED,
            LoginPolicyEvent::IdpProviderRemoved(_) => IDP_PROVIDER_REMOVED,
            LoginPolicyEvent::IdpProviderCascadeRemoved(_) => IDP_PROVIDER_CASCADE_REMOVED,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            LoginPolicyEvent::IdpProviderAdded(e)
            | LoginPolicyEvent::IdpProviderRemoved(e)
            | LoginPolicyEvent::IdpProviderCascadeRemoved(e) => serde_json::to_vec(e),
        }
    }

    fn decode(event_type: &str, payload: &[u8]) -> Result<Decoded<Self>, DecodeError> {
        let event = match event_type {
            IDP_PROVIDER_ADDED => LoginPolicyEvent::IdpProviderAdded(decode_payload(event_type, payload)?),
            IDP_PROVIDER_REMOVED => LoginPolicyEvent::IdpProviderRemoved(decode_payload(event_type, payload)?),
            IDP_PROVIDER_CASCADE_REMOVED => {
                LoginPolicyEvent::IdpProviderCascadeRemoved(decode_payload(event_type, payload)?)
            }
            _ => return Ok(Decoded::Ignored),
        };
        Ok(Decoded::Known(event))
    }
}

/// The set of IDP configurations a login policy offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPolicyIdpProvidersWriteModel {
    base: WriteModelBase,
    providers: BTreeSet<AggregateId>,
}

impl LoginPolicyIdpProvidersWriteModel {
    /// The login policy of `org`.
    pub fn new(org: ResourceOwner) -> Self {
        Self {
            base: WriteModelBase::new(AggregateId::from(&org), org),
            providers: BTreeSet::new(),
        }
    }

    pub fn aggregate(&self) -> AggregateRef {
        AggregateRef::new(
            LOGIN_POLICY_AGGREGATE_TYPE,
            self.base.aggregate_id.clone(),
            self.base.resource_owner.clone(),
        )
        .at_sequence(self.base.processed_sequence)
    }

    pub fn is_linked(&self, idp_config_id: &AggregateId) -> bool {
        self.providers.contains(idp_config_id)
    }

    pub fn providers(&self) -> impl Iterator<Item = &AggregateId> {
        self.providers.iter()
    }

    pub fn add_event(&self, idp_config_id: &AggregateId) -> DomainResult<LoginPolicyEvent> {
        if self.is_linked(idp_config_id) {
            return Err(DomainError::precondition(format!(
                "idp config {idp_config_id} is already part of the login policy"
            )));
        }
        Ok(LoginPolicyEvent::IdpProviderAdded(IdpProviderRef {
            idp_config_id: idp_config_id.clone(),
        }))
    }

    pub fn remove_event(&self, idp_config_id: &AggregateId) -> DomainResult<LoginPolicyEvent> {
        if !self.is_linked(idp_config_id) {
            return Err(DomainError::not_found(format!(
                "idp config {idp_config_id} is not part of the login policy"
            )));
        }
        Ok(LoginPolicyEvent::IdpProviderRemoved(IdpProviderRef {
            idp_config_id: idp_config_id.clone(),
        }))
    }

    /// `None` when there is nothing to unlink.
    pub fn cascade_remove_event(&self, idp_config_id: &AggregateId) -> Option<LoginPolicyEvent> {
        self.is_linked(idp_config_id).then(|| {
            LoginPolicyEvent::IdpProviderCascadeRemoved(IdpProviderRef {
                idp_config_id: idp_config_id.clone(),
            })
        })
    }
}

impl WriteModel for LoginPolicyIdpProvidersWriteModel {
    type Event = LoginPolicyEvent;

    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    // Whole stream, so the replayed sequence is the stream head.
    fn query(&self) -> SearchQuery {
        SearchQuery::new()
            .resource_owner(self.base.resource_owner.clone())
            .aggregate_type(LOGIN_POLICY_AGGREGATE_TYPE)
            .aggregate_id(self.base.aggregate_id.clone())
    }

    fn reduce(&mut self, _envelope: &EventEnvelope, event: &LoginPolicyEvent) {
        match event {
            LoginPolicyEvent::IdpProviderAdded(e) => {
                self.providers.insert(e.idp_config_id.clone());
            }
            LoginPolicyEvent::IdpProviderRemoved(e) | LoginPolicyEvent::IdpProviderCascadeRemoved(e) => {
                self.providers.remove(&e.idp_config_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_events::reduce_envelopes;

    fn envelope(event: &LoginPolicyEvent, sequence: u64) -> EventEnvelope {
        crate::test_support::envelope(LOGIN_POLICY_AGGREGATE_TYPE, "org-1", event, sequence)
    }

    #[test]
    fn policy_id_is_the_organization() {
        let model = LoginPolicyIdpProvidersWriteModel::new("org-1".into());
        assert_eq!(model.aggregate().id().as_str(), "org-1");
        assert_eq!(model.aggregate().aggregate_type(), LOGIN_POLICY_AGGREGATE_TYPE);
    }

    #[test]
    fn link_and_unlink() {
        let idp: AggregateId = "idp-1".into();
        let mut model = LoginPolicyIdpProvidersWriteModel::new("org-1".into());
        assert!(model.cascade_remove_event(&idp).is_none());
        assert!(matches!(model.remove_event(&idp), Err(DomainError::NotFound(_))));

        let added = model.add_event(&idp).unwrap();
        reduce_envelopes(&mut model, &[envelope(&added, 1)]).unwrap();
        assert!(model.is_linked(&idp));
        assert!(matches!(model.add_event(&idp), Err(DomainError::PreconditionFailed(_))));

        let cascade = model.cascade_remove_event(&idp).unwrap();
        reduce_envelopes(&mut model, &[envelope(&cascade, 2)]).unwrap();
        assert!(!model.is_linked(&idp));
        assert_eq!(model.processed_sequence(), 2);
    }
}
