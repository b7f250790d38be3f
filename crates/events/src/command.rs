use warden_core::{ActorId, ResourceOwner};

/// Who is acting, and on behalf of which organization.
///
/// Commands are transient: the context lives only for the duration of one
/// command invocation. Its actor becomes the editor of every event the command
/// produces and its resource owner scopes every aggregate it touches, so
/// tenant isolation is decided here rather than inside each command payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    actor: ActorId,
    resource_owner: ResourceOwner,
    correlation_id: Option<String>,
}

impl CommandContext {
    pub fn new(actor: ActorId, resource_owner: ResourceOwner) -> Self {
        Self {
            actor,
            resource_owner,
            correlation_id: None,
        }
    }

    /// Tag every event of this invocation with an upstream request id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn resource_owner(&self) -> &ResourceOwner {
        &self.resource_owner
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}
