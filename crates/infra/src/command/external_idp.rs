use tracing::instrument;

use warden_core::DomainError;
use warden_events::CommandContext;
use warden_idp::{
    AddUserExternalIdp, ExternalIdpLink, ExternalIdpLinksWriteModel, IdpConfigState, RemoveUserExternalIdp,
};

use super::{expect_unchanged, stage_exact, CommandError, CommandSide};
use crate::event_store::{append_and_reduce, AppendBatch, EventStore};

impl<S> CommandSide<S>
where
    S: EventStore,
{
    /// Let a user sign in through an active IDP configuration.
    ///
    /// The push is also conditioned on the configuration's stream, so a
    /// concurrent deactivation or removal rejects the new link.
    #[instrument(
        skip_all,
        fields(org = %ctx.resource_owner(), user_id = %cmd.user_id, idp_config_id = %cmd.idp_config_id),
        err(level = "debug")
    )]
    pub async fn add_user_external_idp(
        &self,
        ctx: &CommandContext,
        cmd: AddUserExternalIdp,
    ) -> Result<ExternalIdpLink, CommandError> {
        cmd.validate()?;

        let config = self.idp_config(ctx, &cmd.idp_config_id).await?;
        config.ensure_exists()?;
        if config.state != IdpConfigState::Active {
            return Err(DomainError::precondition(format!(
                "idp config {} is not active (state: {})",
                cmd.idp_config_id, config.state
            ))
            .into());
        }

        let mut links = self
            .load(ExternalIdpLinksWriteModel::for_user(ctx.resource_owner().clone(), cmd.user_id.clone()))
            .await?;
        let event = links.add_event(&cmd)?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &links.user_aggregate(&cmd.user_id), &event)?;
        expect_unchanged(&mut batch, &config.aggregate());
        let committed = self.push(batch).await?;
        append_and_reduce(&mut links, &committed)?;

        links
            .links()
            .iter()
            .find(|l| l.idp_config_id == cmd.idp_config_id && l.external_user_id == cmd.external_user_id)
            .cloned()
            .ok_or_else(|| CommandError::Internal("committed link missing from write model".to_string()))
    }

    #[instrument(
        skip_all,
        fields(org = %ctx.resource_owner(), user_id = %cmd.user_id, idp_config_id = %cmd.idp_config_id),
        err(level = "debug")
    )]
    pub async fn remove_user_external_idp(
        &self,
        ctx: &CommandContext,
        cmd: RemoveUserExternalIdp,
    ) -> Result<(), CommandError> {
        let links = self
            .load(ExternalIdpLinksWriteModel::for_user(ctx.resource_owner().clone(), cmd.user_id.clone()))
            .await?;
        let event = links.remove_event(&cmd)?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &links.user_aggregate(&cmd.user_id), &event)?;
        self.push(batch).await?;
        Ok(())
    }
}
