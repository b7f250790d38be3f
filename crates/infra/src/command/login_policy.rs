use tracing::instrument;

use warden_core::AggregateId;
use warden_events::CommandContext;
use warden_idp::{LoginPolicyIdpProvidersWriteModel, RemoveIdpFromLoginPolicy};

use super::{expect_unchanged, stage_exact, CommandError, CommandSide};
use crate::event_store::{AppendBatch, EventStore};

impl<S> CommandSide<S>
where
    S: EventStore,
{
    /// Offer an existing IDP configuration on the organization's login page.
    ///
    /// Conditioned on both the policy and the configuration stream.
    #[instrument(skip_all, fields(org = %ctx.resource_owner(), idp_config_id = %idp_config_id), err(level = "debug"))]
    pub async fn add_idp_to_login_policy(&self, ctx: &CommandContext, idp_config_id: &AggregateId) -> Result<(), CommandError> {
        let config = self.idp_config(ctx, idp_config_id).await?;
        config.ensure_exists()?;

        let policy = self.login_policy(ctx).await?;
        let event = policy.add_event(idp_config_id)?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &policy.aggregate(), &event)?;
        expect_unchanged(&mut batch, &config.aggregate());
        self.push(batch).await?;
        Ok(())
    }

    #[instrument(
        skip_all,
        fields(
            org = %ctx.resource_owner(),
            idp_config_id = %cmd.idp_config_id,
            cascade = cmd.cascade_remove_external_idps
        ),
        err(level = "debug")
    )]
    pub async fn remove_idp_from_login_policy(
        &self,
        ctx: &CommandContext,
        cmd: RemoveIdpFromLoginPolicy,
    ) -> Result<(), CommandError> {
        let policy = self.login_policy(ctx).await?;
        let event = policy.remove_event(&cmd.idp_config_id)?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &policy.aggregate(), &event)?;
        if cmd.cascade_remove_external_idps {
            self.stage_external_idp_cascade(ctx, &cmd.idp_config_id, &mut batch).await?;
        }
        self.push(batch).await?;
        Ok(())
    }

    async fn login_policy(&self, ctx: &CommandContext) -> Result<LoginPolicyIdpProvidersWriteModel, CommandError> {
        self.load(LoginPolicyIdpProvidersWriteModel::new(ctx.resource_owner().clone()))
            .await
    }
}
