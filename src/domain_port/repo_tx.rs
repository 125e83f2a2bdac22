use crate::domain_port::StoreError;
use futures_util::future::BoxFuture;
use std::any::Any;

#[async_trait::async_trait]
pub trait TxManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, StoreError>;
}

/// An open transaction. Dropping it without `commit` discards every write.
#[async_trait::async_trait]
pub trait StorageTx: Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;

    /// Lets a store recover its own transaction type.
    fn as_any(&mut self) -> &mut (dyn Any + Send);
}

/// Runs `work` inside one transaction: commit on `Ok`, rollback on `Err`.
///
/// The transaction function receives everything it needs through its captures
/// and the `tx` argument, and reports business rejections through `E` so they
/// roll back exactly like faults do.
pub async fn run_in_tx<T, E, F>(tx_manager: &dyn TxManager, work: F) -> Result<T, E>
where
    T: Send,
    E: From<StoreError> + Send,
    F: for<'a> FnOnce(&'a mut dyn StorageTx) -> BoxFuture<'a, Result<T, E>> + Send,
{
    let mut tx = tx_manager.begin().await?;

    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}
