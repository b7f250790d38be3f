//! External IDP links on users: "user U signs in through IDP config C as X".
//!
//! Links live on the `user` aggregate. Two views exist: one user's whole
//! stream (for commands on that user) and every link of an organization (the
//! secondary lookup behind cascades).

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, AggregateRef, DomainError, DomainResult, ResourceOwner};
use warden_events::{decode_payload, DecodeError, Decoded, Event, EventEnvelope, SearchQuery, WriteModel, WriteModelBase};

use crate::commands::{AddUserExternalIdp, RemoveUserExternalIdp};

pub const USER_AGGREGATE_TYPE: &str = "user";

pub const USER_EXTERNAL_IDP_ADDED: &str = "user.external_idp.added";
pub const USER_EXTERNAL_IDP_REMOVED: &str = "user.external_idp.removed";
pub const USER_EXTERNAL_IDP_CASCADE_REMOVED: &str = "user.external_idp.cascade_removed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdpAdded {
    pub idp_config_id: AggregateId,
    pub external_user_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdpRemoved {
    pub idp_config_id: AggregateId,
    pub external_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserExternalIdpEvent {
    Added(ExternalIdpAdded),
    Removed(ExternalIdpRemoved),
    CascadeRemoved(ExternalIdpRemoved),
}

impl Event for UserExternalIdpEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserExternalIdpEvent::Added(_) => USER_EXTERNAL_IDP_ADDED,
            UserExternalIdpEvent::Removed(_) => USER_EXTERNAL_IDP_REMOVED,
            UserExternalIdpEvent::CascadeRemoved(_) => USER_EXTERNAL_IDP_CASCADE_REMOVED,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            UserExternalIdpEvent::Added(e) => serde_json::to_vec(e),
            UserExternalIdpEvent::Removed(e) | UserExternalIdpEvent::CascadeRemoved(e) => serde_json::to_vec(e),
        }
    }

    fn decode(event_type: &str, payload: &[u8]) -> Result<Decoded<Self>, DecodeError> {
        let event = match event_type {
            USER_EXTERNAL_IDP_ADDED => UserExternalIdpEvent::Added(decode_payload(event_type, payload)?),
            USER_EXTERNAL_IDP_REMOVED => UserExternalIdpEvent::Removed(decode_payload(event_type, payload)?),
            USER_EXTERNAL_IDP_CASCADE_REMOVED => {
                UserExternalIdpEvent::CascadeRemoved(decode_payload(event_type, payload)?)
            }
            _ => return Ok(Decoded::Ignored),
        };
        Ok(Decoded::Known(event))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdpLink {
    pub user_id: AggregateId,
    pub idp_config_id: AggregateId,
    pub external_user_id: String,
    pub display_name: String,
}

/// External IDP links of one user, or of every user of an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdpLinksWriteModel {
    base: WriteModelBase,
    user_id: Option<AggregateId>,
    links: Vec<ExternalIdpLink>,
}

impl ExternalIdpLinksWriteModel {
    /// Replays the whole stream of `user_id`; the replayed sequence can be
    /// used as an exact expectation.
    pub fn for_user(org: ResourceOwner, user_id: AggregateId) -> Self {
        Self {
            base: WriteModelBase::new(user_id.clone(), org),
            user_id: Some(user_id),
            links: Vec::new(),
        }
    }

    /// Replays only the link events of every user of `org`. The high-water
    /// mark spans several streams and says nothing about any single one.
    pub fn for_org(org: ResourceOwner) -> Self {
        Self {
            base: WriteModelBase::new(AggregateId::from(&org), org),
            user_id: None,
            links: Vec::new(),
        }
    }

    pub fn links(&self) -> &[ExternalIdpLink] {
        &self.links
    }

    pub fn links_of_idp<'a>(&'a self, idp_config_id: &'a AggregateId) -> impl Iterator<Item = &'a ExternalIdpLink> {
        self.links.iter().filter(move |l| &l.idp_config_id == idp_config_id)
    }

    /// Reference to `user_id`'s aggregate. Sequence is only meaningful for a
    /// single-user model.
    pub fn user_aggregate(&self, user_id: &AggregateId) -> AggregateRef {
        let aggregate = AggregateRef::new(USER_AGGREGATE_TYPE, user_id.clone(), self.base.resource_owner.clone());
        match &self.user_id {
            Some(own) if own == user_id => aggregate.at_sequence(self.base.processed_sequence),
            _ => aggregate,
        }
    }

    fn find(&self, user_id: &AggregateId, idp_config_id: &AggregateId, external_user_id: &str) -> Option<&ExternalIdpLink> {
        self.links.iter().find(|l| {
            &l.user_id == user_id && &l.idp_config_id == idp_config_id && l.external_user_id == external_user_id
        })
    }

    pub fn add_event(&self, cmd: &AddUserExternalIdp) -> DomainResult<UserExternalIdpEvent> {
        cmd.validate()?;
        if self.find(&cmd.user_id, &cmd.idp_config_id, &cmd.external_user_id).is_some() {
            return Err(DomainError::precondition(format!(
                "user {} is already linked to idp config {}",
                cmd.user_id, cmd.idp_config_id
            )));
        }
        Ok(UserExternalIdpEvent::Added(ExternalIdpAdded {
            idp_config_id: cmd.idp_config_id.clone(),
            external_user_id: cmd.external_user_id.clone(),
            display_name: cmd.display_name.clone(),
        }))
    }

    pub fn remove_event(&self, cmd: &RemoveUserExternalIdp) -> DomainResult<UserExternalIdpEvent> {
        if self.find(&cmd.user_id, &cmd.idp_config_id, &cmd.external_user_id).is_none() {
            return Err(DomainError::not_found(format!(
                "user {} has no link to idp config {}",
                cmd.user_id, cmd.idp_config_id
            )));
        }
        Ok(UserExternalIdpEvent::Removed(ExternalIdpRemoved {
            idp_config_id: cmd.idp_config_id.clone(),
            external_user_id: cmd.external_user_id.clone(),
        }))
    }

    /// One cascade event per link of `idp_config_id`, paired with the user
    /// it belongs to, in link order.
    pub fn cascade_remove_events(&self, idp_config_id: &AggregateId) -> Vec<(AggregateId, UserExternalIdpEvent)> {
        self.links_of_idp(idp_config_id)
            .map(|l| {
                (
                    l.user_id.clone(),
                    UserExternalIdpEvent::CascadeRemoved(ExternalIdpRemoved {
                        idp_config_id: l.idp_config_id.clone(),
                        external_user_id: l.external_user_id.clone(),
                    }),
                )
            })
            .collect()
    }
}

impl WriteModel for ExternalIdpLinksWriteModel {
    type Event = UserExternalIdpEvent;

    fn base(&self) -> &WriteModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModelBase {
        &mut self.base
    }

    fn query(&self) -> SearchQuery {
        let query = SearchQuery::new()
            .resource_owner(self.base.resource_owner.clone())
            .aggregate_type(USER_AGGREGATE_TYPE);
        match &self.user_id {
            Some(user_id) => query.aggregate_id(user_id.clone()),
            None => query.event_types([
                USER_EXTERNAL_IDP_ADDED,
                USER_EXTERNAL_IDP_REMOVED,
                USER_EXTERNAL_IDP_CASCADE_REMOVED,
            ]),
        }
    }

    fn reduce(&mut self, envelope: &EventEnvelope, event: &UserExternalIdpEvent) {
        let user_id = &envelope.aggregate_id;
        match event {
            UserExternalIdpEvent::Added(e) => self.links.push(ExternalIdpLink {
                user_id: user_id.clone(),
                idp_config_id: e.idp_config_id.clone(),
                external_user_id: e.external_user_id.clone(),
                display_name: e.display_name.clone(),
            }),
            UserExternalIdpEvent::Removed(e) | UserExternalIdpEvent::CascadeRemoved(e) => {
                self.links.retain(|l| {
                    !(&l.user_id == user_id
                        && l.idp_config_id == e.idp_config_id
                        && l.external_user_id == e.external_user_id)
                });
            }
        }
    }
}
