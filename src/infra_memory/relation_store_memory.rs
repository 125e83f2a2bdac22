use crate::domain_model::*;
use crate::domain_port::*;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

type DocKey = (RecordKind, UserId);

struct Document {
    version: u64,
    // `None` is a tombstone: the version survives deletion so a later
    // re-creation cannot look unchanged to an open transaction. Tombstones
    // are dropped once no transaction is open.
    members: Option<IdSet>,
}

#[derive(Default)]
struct MemoryState {
    docs: HashMap<DocKey, Document>,
    last_version: u64,
    write_faults: HashSet<DocKey>,
    open_txs: usize,
}

impl MemoryState {
    fn version_of(&self, key: &DocKey) -> u64 {
        self.docs.get(key).map(|d| d.version).unwrap_or(0)
    }

    fn members_of(&self, key: &DocKey) -> IdSet {
        self.docs
            .get(key)
            .and_then(|d| d.members.clone())
            .unwrap_or_default()
    }

    fn check_fault(&self, key: &DocKey) -> Result<(), StoreError> {
        if self.write_faults.contains(key) {
            return Err(StoreError::Backend(format!(
                "injected write fault for {:?} of {}",
                key.0, key.1
            )));
        }
        Ok(())
    }

    fn apply(&mut self, key: DocKey, members: Option<IdSet>) {
        self.last_version += 1;
        let version = self.last_version;
        self.docs.insert(key, Document { version, members });
    }

    fn close_tx(&mut self) {
        self.open_txs = self.open_txs.saturating_sub(1);
        if self.open_txs == 0 {
            self.docs.retain(|_, d| d.members.is_some());
        }
    }
}

/// Document store kept in process memory, with optimistic transactions.
///
/// A transaction records the version of every document it reads and buffers
/// its writes; commit fails with [`StoreError::WriteConflict`] when any of
/// those documents changed in the meantime, the way a document database
/// aborts the loser of two conflicting transactions.
#[derive(Clone, Default)]
pub struct MemoryRelationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write of the given record fail.
    pub fn inject_write_fault(&self, kind: RecordKind, owner: &UserId) {
        if let Ok(mut state) = self.state.lock() {
            state.write_faults.insert((kind, owner.clone()));
        }
    }

    pub fn clear_write_faults(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.write_faults.clear();
        }
    }

    /// Whether a live record exists, as opposed to an implicit empty one.
    pub fn has_record(&self, kind: RecordKind, owner: &UserId) -> bool {
        self.state
            .lock()
            .map(|s| {
                s.docs
                    .get(&(kind, owner.clone()))
                    .is_some_and(|d| d.members.is_some())
            })
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store poisoned: {e}")))
    }

    fn load(&self, key: DocKey) -> Result<IdSet, StoreError> {
        Ok(self.lock()?.members_of(&key))
    }

    fn store(&self, key: DocKey, members: IdSet) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.check_fault(&key)?;
        state.apply(key, Some(members));
        Ok(())
    }

    fn open_tx(&self) -> MemoryTx {
        if let Ok(mut state) = self.state.lock() {
            state.open_txs += 1;
        }
        MemoryTx {
            state: self.state.clone(),
            reads: HashMap::new(),
            writes: HashMap::new(),
        }
    }
}

pub struct MemoryTx {
    state: Arc<Mutex<MemoryState>>,
    reads: HashMap<DocKey, u64>,
    writes: HashMap<DocKey, Option<IdSet>>,
}

impl MemoryTx {
    fn load(&mut self, key: DocKey) -> Result<IdSet, StoreError> {
        if let Some(members) = self.writes.get(&key) {
            return Ok(members.clone().unwrap_or_default());
        }

        let state = self
            .state
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store poisoned: {e}")))?;
        let version = state.version_of(&key);
        let members = state.members_of(&key);
        drop(state);

        self.reads.entry(key).or_insert(version);
        Ok(members)
    }

    fn stage(&mut self, key: DocKey, members: Option<IdSet>) -> Result<(), StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store poisoned: {e}")))?;
        state.check_fault(&key)?;
        drop(state);

        self.writes.insert(key, members);
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = *self;
        let writes = std::mem::take(&mut tx.writes);

        // released before `tx` drops and closes itself
        let mut state = tx
            .state
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store poisoned: {e}")))?;

        for (key, seen) in &tx.reads {
            if state.version_of(key) != *seen {
                return Err(StoreError::WriteConflict(format!("{:?} of {}", key.0, key.1)));
            }
        }
        for (key, members) in writes {
            state.apply(key, members);
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    fn as_any(&mut self) -> &mut (dyn Any + Send) {
        self
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.close_tx();
        }
    }
}

fn downcast(tx: &mut dyn StorageTx) -> Result<&mut MemoryTx, StoreError> {
    tx.as_any()
        .downcast_mut::<MemoryTx>()
        .ok_or(StoreError::ForeignTx)
}

#[async_trait::async_trait]
impl TxManager for MemoryRelationStore {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, StoreError> {
        Ok(Box::new(self.open_tx()))
    }
}

#[async_trait::async_trait]
impl RelationStore for MemoryRelationStore {
    async fn get_pending_requests(&self, owner: &UserId) -> Result<PendingRequests, StoreError> {
        let requesters = self.load((RecordKind::PendingRequests, owner.clone()))?;
        Ok(PendingRequests {
            owner: owner.clone(),
            requesters,
        })
    }

    async fn save_pending_requests(&self, record: &PendingRequests) -> Result<(), StoreError> {
        self.store(
            (RecordKind::PendingRequests, record.owner.clone()),
            record.requesters.clone(),
        )
    }

    async fn get_friendship(&self, owner: &UserId) -> Result<Friendship, StoreError> {
        let friends = self.load((RecordKind::Friendship, owner.clone()))?;
        Ok(Friendship {
            owner: owner.clone(),
            friends,
        })
    }

    async fn save_friendship(&self, record: &Friendship) -> Result<(), StoreError> {
        self.store(
            (RecordKind::Friendship, record.owner.clone()),
            record.friends.clone(),
        )
    }

    async fn purge_user(&self, user: &UserId) -> Result<(), StoreError> {
        let mut tx = self.open_tx();
        tx.stage((RecordKind::PendingRequests, user.clone()), None)?;
        tx.stage((RecordKind::Friendship, user.clone()), None)?;
        Box::new(tx).commit().await
    }

    async fn get_pending_requests_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        owner: &UserId,
    ) -> Result<PendingRequests, StoreError> {
        let requesters = downcast(tx)?.load((RecordKind::PendingRequests, owner.clone()))?;
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
        downcast(tx)?.stage(
            (RecordKind::PendingRequests, record.owner.clone()),
            Some(record.requesters.clone()),
        )
    }

    async fn get_friendship_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        owner: &UserId,
    ) -> Result<Friendship, StoreError> {
        let friends = downcast(tx)?.load((RecordKind::Friendship, owner.clone()))?;
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
        downcast(tx)?.stage(
            (RecordKind::Friendship, record.owner.clone()),
            Some(record.friends.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn absent_records_read_as_empty() {
        let store = MemoryRelationStore::new();

        let requests = store.get_pending_requests(&uid("ghost")).await.unwrap();
        assert_eq!(requests, PendingRequests::empty(uid("ghost")));

        let friendship = store.get_friendship(&uid("ghost")).await.unwrap();
        assert_eq!(friendship, Friendship::empty(uid("ghost")));
    }

    #[tokio::test]
    async fn save_replaces_the_whole_set() {
        let store = MemoryRelationStore::new();
        let mut record = Friendship::empty(uid("u1"));
        record.friends.insert(uid("u2"));
        record.friends.insert(uid("u3"));
        store.save_friendship(&record).await.unwrap();

        record.friends.remove(&uid("u2"));
        store.save_friendship(&record).await.unwrap();

        let loaded = store.get_friendship(&uid("u1")).await.unwrap();
        assert_eq!(loaded.friends.as_slice(), &[uid("u3")]);
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = MemoryRelationStore::new();
        let mut tx = store.begin().await.unwrap();

        let mut record = store.get_friendship_in_tx(&mut *tx, &uid("u1")).await.unwrap();
        record.friends.insert(uid("u2"));
        store.save_friendship_in_tx(&mut *tx, &record).await.unwrap();

        // read-your-writes inside the transaction
        let inside = store.get_friendship_in_tx(&mut *tx, &uid("u1")).await.unwrap();
        assert!(inside.friends.contains(&uid("u2")));

        let outside = store.get_friendship(&uid("u1")).await.unwrap();
        assert!(outside.friends.is_empty());

        tx.rollback().await.unwrap();
        assert!(!store.has_record(RecordKind::Friendship, &uid("u1")));
    }

    #[tokio::test]
    async fn conflicting_commit_is_rejected() {
        let store = MemoryRelationStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        for tx in [&mut first, &mut second] {
            let mut record = store.get_pending_requests_in_tx(&mut **tx, &uid("u2")).await.unwrap();
            record.requesters.insert(uid("u1"));
            store.save_pending_requests_in_tx(&mut **tx, &record).await.unwrap();
        }

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict(_)));

        let stored = store.get_pending_requests(&uid("u2")).await.unwrap();
        assert_eq!(stored.requesters.len(), 1);
    }

    #[tokio::test]
    async fn purge_is_idempotent() {
        let store = MemoryRelationStore::new();
        store.purge_user(&uid("nobody")).await.unwrap();

        let mut record = PendingRequests::empty(uid("u3"));
        record.requesters.insert(uid("u1"));
        store.save_pending_requests(&record).await.unwrap();
        store
            .save_friendship(&Friendship {
                owner: uid("u3"),
                friends: vec![uid("u4")].into(),
            })
            .await
            .unwrap();

        store.purge_user(&uid("u3")).await.unwrap();
        store.purge_user(&uid("u3")).await.unwrap();

        assert!(!store.has_record(RecordKind::PendingRequests, &uid("u3")));
        assert!(!store.has_record(RecordKind::Friendship, &uid("u3")));
    }

    fn doc_count(store: &MemoryRelationStore) -> usize {
        store.state.lock().unwrap().docs.len()
    }

    #[tokio::test]
    async fn tombstones_outlive_only_open_transactions() {
        let store = MemoryRelationStore::new();
        store
            .save_friendship(&Friendship {
                owner: uid("u1"),
                friends: vec![uid("u2")].into(),
            })
            .await
            .unwrap();

        let mut reader = store.begin().await.unwrap();
        store.get_friendship_in_tx(&mut *reader, &uid("u1")).await.unwrap();
        store.purge_user(&uid("u1")).await.unwrap();
        store.purge_user(&uid("u5")).await.unwrap();

        // both kinds for both users stay tombstoned while `reader` is open
        assert_eq!(doc_count(&store), 4);
        assert!(matches!(
            reader.commit().await,
            Err(StoreError::WriteConflict(_))
        ));
        assert_eq!(doc_count(&store), 0);

        store.purge_user(&uid("u1")).await.unwrap();
        assert_eq!(doc_count(&store), 0);
    }

    #[tokio::test]
    async fn injected_fault_fails_the_write() {
        let store = MemoryRelationStore::new();
        store.inject_write_fault(RecordKind::Friendship, &uid("u1"));

        let err = store
            .save_friendship(&Friendship::empty(uid("u1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));

        store.clear_write_faults();
        store
            .save_friendship(&Friendship::empty(uid("u1")))
            .await
            .unwrap();
    }
}
