use super::util::{downcast, store_error};
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::types::Json;
use sqlx::{MySqlExecutor, MySqlPool, Row};

const CREATE_FRIEND_REQUEST_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS friend_request (
    owner_id   VARCHAR(64) NOT NULL,
    member_ids JSON        NOT NULL,
    updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
    PRIMARY KEY (owner_id)
)
"#;

const CREATE_FRIENDSHIP_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS friendship (
    owner_id   VARCHAR(64) NOT NULL,
    member_ids JSON        NOT NULL,
    updated_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3),
    PRIMARY KEY (owner_id)
)
"#;

fn table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::PendingRequests => "friend_request",
        RecordKind::Friendship => "friendship",
    }
}

/// One row per owner and record kind, member ids kept as a JSON array.
///
/// Reads inside a transaction take the row lock (`FOR UPDATE`), so two
/// transactions touching the same owner are serialised by InnoDB; a deadlock
/// between them is reported as [`StoreError::WriteConflict`].
pub struct MySqlRelationStore {
    pool: MySqlPool,
}

impl MySqlRelationStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRelationStore { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for ddl in [CREATE_FRIEND_REQUEST_TABLE, CREATE_FRIENDSHIP_TABLE] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("create table", e))?;
        }
        Ok(())
    }

    async fn fetch<'e>(
        executor: impl MySqlExecutor<'e>,
        kind: RecordKind,
        owner: &UserId,
        lock: bool,
    ) -> Result<IdSet, StoreError> {
        let sql = format!(
            "SELECT member_ids FROM {} WHERE owner_id = ?{}",
            table(kind),
            if lock { " FOR UPDATE" } else { "" }
        );

        let row = sqlx::query(&sql)
            .bind(owner)
            .fetch_optional(executor)
            .await
            .map_err(|e| store_error("select members", e))?;

        match row {
            Some(row) => {
                let Json(members) = row
                    .try_get::<Json<IdSet>, _>("member_ids")
                    .map_err(|e| store_error("decode members", e))?;
                Ok(members)
            }
            None => Ok(IdSet::new()),
        }
    }

    async fn upsert<'e>(
        executor: impl MySqlExecutor<'e>,
        kind: RecordKind,
        owner: &UserId,
        members: &IdSet,
    ) -> Result<(), StoreError> {
        let sql = format!(
            r#"
INSERT INTO {} (owner_id, member_ids)
VALUES (?, ?)
ON DUPLICATE KEY UPDATE member_ids = VALUES(member_ids)
"#,
            table(kind)
        );

        sqlx::query(&sql)
            .bind(owner)
            .bind(Json(members))
            .execute(executor)
            .await
            .map_err(|e| store_error("upsert members", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl RelationStore for MySqlRelationStore {
    async fn get_pending_requests(&self, owner: &UserId) -> Result<PendingRequests, StoreError> {
        let requesters = Self::fetch(&self.pool, RecordKind::PendingRequests, owner, false).await?;
        Ok(PendingRequests {
            owner: owner.clone(),
            requesters,
        })
    }

    async fn save_pending_requests(&self, record: &PendingRequests) -> Result<(), StoreError> {
        Self::upsert(
            &self.pool,
            RecordKind::PendingRequests,
            &record.owner,
            &record.requesters,
        )
        .await
    }

    async fn get_friendship(&self, owner: &UserId) -> Result<Friendship, StoreError> {
        let friends = Self::fetch(&self.pool, RecordKind::Friendship, owner, false).await?;
        Ok(Friendship {
            owner: owner.clone(),
            friends,
        })
    }

    async fn save_friendship(&self, record: &Friendship) -> Result<(), StoreError> {
        Self::upsert(
            &self.pool,
            RecordKind::Friendship,
            &record.owner,
            &record.friends,
        )
        .await
    }

    async fn purge_user(&self, user: &UserId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin purge", e))?;

        for kind in [RecordKind::PendingRequests, RecordKind::Friendship] {
            let sql = format!("DELETE FROM {} WHERE owner_id = ?", table(kind));
            sqlx::query(&sql)
                .bind(user)
                .execute(&mut *tx)
                .await
                .map_err(|e| store_error("delete owner rows", e))?;
        }

        tx.commit().await.map_err(|e| store_error("commit purge", e))
    }

    async fn get_pending_requests_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        owner: &UserId,
    ) -> Result<PendingRequests, StoreError> {
        let tx = downcast(tx)?;
        let requesters = Self::fetch(tx.conn(), RecordKind::PendingRequests, owner, true).await?;
        Ok(PendingRequests {
            owner: owner.clone(),
            requesters,
        })
    }

    async fn save_pending_requests_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        record: &PendingRequests,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx)?;
        Self::upsert(
            tx.conn(),
            RecordKind::PendingRequests,
            &record.owner,
            &record.requesters,
        )
        .await
    }

    async fn get_friendship_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        owner: &UserId,
    ) -> Result<Friendship, StoreError> {
        let tx = downcast(tx)?;
        let friends = Self::fetch(tx.conn(), RecordKind::Friendship, owner, true).await?;
        Ok(Friendship {
            owner: owner.clone(),
            friends,
        })
    }

    async fn save_friendship_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        record: &Friendship,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx)?;
        Self::upsert(
            tx.conn(),
            RecordKind::Friendship,
            &record.owner,
            &record.friends,
        )
        .await
    }
}
