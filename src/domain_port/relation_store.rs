use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("write conflict on {0}")]
    WriteConflict(String),
    #[error("transaction does not belong to this store")]
    ForeignTx,
    #[error("store error: {0}")]
    Backend(String),
}

/// Per-user pending-request and friendship records.
///
/// Reads of an absent record return an empty record scoped to the owner;
/// "not found" is never an error. Saves are upserts that replace the whole
/// member set.
#[async_trait::async_trait]
pub trait RelationStore: Send + Sync {
    async fn get_pending_requests(&self, owner: &UserId) -> Result<PendingRequests, StoreError>;

    async fn save_pending_requests(&self, record: &PendingRequests) -> Result<(), StoreError>;

    async fn get_friendship(&self, owner: &UserId) -> Result<Friendship, StoreError>;

    async fn save_friendship(&self, record: &Friendship) -> Result<(), StoreError>;

    /// Deletes both records of `user`. Purging an unknown user is a no-op.
    async fn purge_user(&self, user: &UserId) -> Result<(), StoreError>;

    async fn get_pending_requests_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        owner: &UserId,
    ) -> Result<PendingRequests, StoreError>;

    async fn save_pending_requests_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        record: &PendingRequests,
    ) -> Result<(), StoreError>;

    async fn get_friendship_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        owner: &UserId,
    ) -> Result<Friendship, StoreError>;

    async fn save_friendship_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        record: &Friendship,
    ) -> Result<(), StoreError>;
}
