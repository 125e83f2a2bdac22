use crate::domain_model::*;
use crate::domain_port::RelationStore;
use crate::server::{EventHandler, HandleOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Reacts to the users service's lifecycle events.
pub struct UserEventsHandler {
    relation_store: Arc<dyn RelationStore>,
    timeout: Duration,
}

impl UserEventsHandler {
    pub fn new(relation_store: Arc<dyn RelationStore>, timeout: Duration) -> Self {
        Self {
            relation_store,
            timeout,
        }
    }

    async fn on_user_deleted(&self, data: serde_json::Value) -> HandleOutcome {
        let deleted = match serde_json::from_value::<UserDeleted>(data) {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!(error = %e, "malformed user.delete data; skipping");
                return HandleOutcome::SkipCommit;
            }
        };

        tracing::info!(user_id = %deleted.id, "purging relations of deleted user");

        // Records of other users that still list the deleted id are left as is.
        match tokio::time::timeout(self.timeout, self.relation_store.purge_user(&deleted.id)).await
        {
            Ok(Ok(())) => HandleOutcome::Commit,
            Ok(Err(e)) => {
                tracing::error!(user_id = %deleted.id, error = %e, "purge failed");
                HandleOutcome::Retry
            }
            Err(_) => {
                tracing::error!(user_id = %deleted.id, timeout = ?self.timeout, "purge timed out");
                HandleOutcome::Retry
            }
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for UserEventsHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<HandleOutcome> {
        let event = match serde_json::from_slice::<UserEvent>(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "malformed user event; skipping");
                return Ok(HandleOutcome::SkipCommit);
            }
        };

        if event.kind != USER_DELETE_EVENT {
            tracing::debug!(kind = %event.kind, "ignoring user event");
            return Ok(HandleOutcome::Commit);
        }

        Ok(self.on_user_deleted(event.data).await)
    }
}
