//! IDP configuration lifecycle: add, change, deactivate, reactivate, remove.

use tracing::{instrument, Span};

use warden_core::AggregateId;
use warden_events::CommandContext;
use warden_idp::{
    AddIdpConfig, ChangeIdpConfig, ExternalIdpLinksWriteModel, IdpConfig, IdpConfigWriteModel,
    LoginPolicyIdpProvidersWriteModel, RemoveIdpConfig,
};

use super::{stage, stage_exact, CommandError, CommandSide};
use crate::event_store::{append_and_reduce, AppendBatch, EventStore};

impl<S> CommandSide<S>
where
    S: EventStore,
{
    /// Create a configuration under a freshly generated id.
    ///
    /// The two creation events are pushed without expectation: nobody else can
    /// know the new id yet.
    #[instrument(
        skip_all,
        fields(org = %ctx.resource_owner(), idp_config_id = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn add_idp_config(&self, ctx: &CommandContext, cmd: AddIdpConfig) -> Result<IdpConfig, CommandError> {
        let oidc = cmd.validate()?;

        let idp_config_id = self.id_generator.next_id();
        Span::current().record("idp_config_id", idp_config_id.as_str());
        let mut model = IdpConfigWriteModel::new(idp_config_id, ctx.resource_owner().clone());

        let client_secret = self.secret_crypto.encrypt(oidc.client_secret.as_bytes()).await?;
        let events = model.added_events(&cmd, oidc, client_secret)?;

        let aggregate = model.aggregate();
        let mut batch = AppendBatch::new();
        for event in &events {
            stage(&mut batch, ctx, &aggregate, event)?;
        }

        let committed = self.push(batch).await?;
        append_and_reduce(&mut model, &committed)?;
        Ok(model.to_idp_config())
    }

    /// Change `name` and/or `styling_type`. A request equal to the current
    /// state is rejected instead of producing an empty event.
    #[instrument(
        skip_all,
        fields(org = %ctx.resource_owner(), idp_config_id = %cmd.idp_config_id),
        err(level = "debug")
    )]
    pub async fn change_idp_config(&self, ctx: &CommandContext, cmd: ChangeIdpConfig) -> Result<IdpConfig, CommandError> {
        let mut model = self.idp_config(ctx, &cmd.idp_config_id).await?;
        let event = model.changed_event(&cmd)?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &model.aggregate(), &event)?;

        let committed = self.push(batch).await?;
        append_and_reduce(&mut model, &committed)?;
        Ok(model.to_idp_config())
    }

    #[instrument(skip_all, fields(org = %ctx.resource_owner(), idp_config_id = %idp_config_id), err(level = "debug"))]
    pub async fn deactivate_idp_config(&self, ctx: &CommandContext, idp_config_id: &AggregateId) -> Result<(), CommandError> {
        let model = self.idp_config(ctx, idp_config_id).await?;
        let event = model.deactivate_event()?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &model.aggregate(), &event)?;
        self.push(batch).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(org = %ctx.resource_owner(), idp_config_id = %idp_config_id), err(level = "debug"))]
    pub async fn reactivate_idp_config(&self, ctx: &CommandContext, idp_config_id: &AggregateId) -> Result<(), CommandError> {
        let model = self.idp_config(ctx, idp_config_id).await?;
        let event = model.reactivate_event()?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &model.aggregate(), &event)?;
        self.push(batch).await?;
        Ok(())
    }

    /// Remove a deactivated configuration.
    ///
    /// With `cascade_remove_providers` the login-policy link and every user
    /// link of the configuration are removed in the same batch, ordered after
    /// the primary removal. Either all of them commit or none does.
    #[instrument(
        skip_all,
        fields(
            org = %ctx.resource_owner(),
            idp_config_id = %cmd.idp_config_id,
            cascade = cmd.cascade_remove_providers,
            event_count = tracing::field::Empty
        ),
        err(level = "debug")
    )]
    pub async fn remove_idp_config(&self, ctx: &CommandContext, cmd: RemoveIdpConfig) -> Result<(), CommandError> {
        let model = self.idp_config(ctx, &cmd.idp_config_id).await?;
        let event = model.remove_event()?;

        let mut batch = AppendBatch::new();
        stage_exact(&mut batch, ctx, &model.aggregate(), &event)?;

        if cmd.cascade_remove_providers {
            let policy = self
                .load(LoginPolicyIdpProvidersWriteModel::new(ctx.resource_owner().clone()))
                .await?;
            if let Some(event) = policy.cascade_remove_event(&cmd.idp_config_id) {
                stage_exact(&mut batch, ctx, &policy.aggregate(), &event)?;
            }
            self.stage_external_idp_cascade(ctx, &cmd.idp_config_id, &mut batch).await?;
        }

        Span::current().record("event_count", batch.len());
        self.push(batch).await?;
        Ok(())
    }

    /// Stage a cascade removal for every user link of `idp_config_id` in the
    /// acting organization.
    ///
    /// Unconditioned: the organization-wide link view reads only the link
    /// events of each user stream, so it knows no stream head to expect.
    pub(super) async fn stage_external_idp_cascade(
        &self,
        ctx: &CommandContext,
        idp_config_id: &AggregateId,
        batch: &mut AppendBatch,
    ) -> Result<(), CommandError> {
        let links = self
            .load(ExternalIdpLinksWriteModel::for_org(ctx.resource_owner().clone()))
            .await?;
        for (user_id, event) in links.cascade_remove_events(idp_config_id) {
            stage(batch, ctx, &links.user_aggregate(&user_id), &event)?;
        }
        Ok(())
    }

    pub(super) async fn idp_config(
        &self,
        ctx: &CommandContext,
        idp_config_id: &AggregateId,
    ) -> Result<IdpConfigWriteModel, CommandError> {
        self.load(IdpConfigWriteModel::new(idp_config_id.clone(), ctx.resource_owner().clone()))
            .await
    }
}
