use crate::domain_port::{StorageTx, StoreError, TxManager};
use sqlx::{MySql, MySqlConnection, MySqlPool, Transaction};
use std::any::Any;

pub struct MySqlTxManager {
    pool: MySqlPool,
}

impl MySqlTxManager {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTxManager { pool }
    }
}

#[async_trait::async_trait]
impl TxManager for MySqlTxManager {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(format!("begin transaction: {e}")))?;
        Ok(Box::new(MySqlTx::new(tx)))
    }
}

/// Rolled back by sqlx when dropped uncommitted.
pub struct MySqlTx {
    inner: Transaction<'static, MySql>,
}

impl MySqlTx {
    pub fn new(inner: Transaction<'static, MySql>) -> Self {
        MySqlTx { inner }
    }

    pub fn conn(&mut self) -> &mut MySqlConnection {
        &mut self.inner
    }
}

#[async_trait::async_trait]
impl StorageTx for MySqlTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner
            .commit()
            .await
            .map_err(|e| StoreError::Backend(format!("commit: {e}")))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner
            .rollback()
            .await
            .map_err(|e| StoreError::Backend(format!("rollback: {e}")))
    }

    fn as_any(&mut self) -> &mut (dyn Any + Send) {
        self
    }
}
