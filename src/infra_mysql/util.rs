use super::repo_tx_mysql::MySqlTx;
use crate::domain_port::*;
use sqlx::mysql::MySqlDatabaseError;

pub fn downcast(tx: &mut dyn StorageTx) -> Result<&mut MySqlTx, StoreError> {
    tx.as_any()
        .downcast_mut::<MySqlTx>()
        .ok_or(StoreError::ForeignTx)
}

/// Deadlocks and lock wait timeouts: the losing side of two transactions on
/// the same documents.
pub fn is_conflict(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            // ER_LOCK_DEADLOCK, ER_LOCK_WAIT_TIMEOUT
            return matches!(mysql_err.number(), 1213 | 1205);
        }
    }

    false
}

pub fn store_error(context: &str, err: sqlx::Error) -> StoreError {
    if is_conflict(&err) {
        StoreError::WriteConflict(format!("{context}: {err}"))
    } else {
        StoreError::Backend(format!("{context}: {err}"))
    }
}
