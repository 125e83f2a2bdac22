use crate::application_port::RelationError;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

/// Moves a pair of users between "requested" and "friends" atomically.
///
/// Each transition is one transaction over every record it touches, so a
/// crash or a concurrent transition on the same pair can never leave one side
/// updated and the other not. Conflicting transactions are rejected by the
/// store and surface as [`RelationError::Store`]; nothing is retried here.
#[derive(Clone)]
pub struct FriendshipTxEngine {
    relation_store: Arc<dyn RelationStore>,
    tx_manager: Arc<dyn TxManager>,
}

impl FriendshipTxEngine {
    pub fn new(relation_store: Arc<dyn RelationStore>, tx_manager: Arc<dyn TxManager>) -> Self {
        Self {
            relation_store,
            tx_manager,
        }
    }

    /// `to` accepts the request previously sent by `from`.
    pub async fn accept(&self, from: &UserId, to: &UserId) -> Result<(), RelationError> {
        let store = self.relation_store.clone();
        let (from, to) = (from.clone(), to.clone());

        run_in_tx(self.tx_manager.as_ref(), move |tx| {
            Box::pin(async move { accept_in_tx(store.as_ref(), tx, &from, &to).await })
        })
        .await
    }

    pub async fn remove(&self, from: &UserId, to: &UserId) -> Result<(), RelationError> {
        let store = self.relation_store.clone();
        let (from, to) = (from.clone(), to.clone());

        run_in_tx(self.tx_manager.as_ref(), move |tx| {
            Box::pin(async move { remove_in_tx(store.as_ref(), tx, &from, &to).await })
        })
        .await
    }
}

pub async fn accept_in_tx(
    store: &dyn RelationStore,
    tx: &mut dyn StorageTx,
    from: &UserId,
    to: &UserId,
) -> Result<(), RelationError> {
    if from == to {
        return Err(RelationError::SelfReference);
    }

    let mut requests = store.get_pending_requests_in_tx(tx, to).await?;
    if !requests.requesters.remove(from) {
        return Err(RelationError::NotRequested);
    }
    store.save_pending_requests_in_tx(tx, &requests).await?;

    let mut to_friends = store.get_friendship_in_tx(tx, to).await?;
    if to_friends.friends.contains(from) {
        return Err(RelationError::AlreadyFriends);
    }
    let mut from_friends = store.get_friendship_in_tx(tx, from).await?;
    if from_friends.friends.contains(to) {
        return Err(RelationError::AlreadyFriends);
    }

    to_friends.friends.insert(from.clone());
    from_friends.friends.insert(to.clone());

    store.save_friendship_in_tx(tx, &to_friends).await?;
    store.save_friendship_in_tx(tx, &from_friends).await?;

    // a crossing request from `to` is settled by the same friendship
    let mut crossing = store.get_pending_requests_in_tx(tx, from).await?;
    if crossing.requesters.remove(to) {
        store.save_pending_requests_in_tx(tx, &crossing).await?;
    }

    tracing::debug!(%from, %to, "friend request accepted");
    Ok(())
}

pub async fn remove_in_tx(
    store: &dyn RelationStore,
    tx: &mut dyn StorageTx,
    from: &UserId,
    to: &UserId,
) -> Result<(), RelationError> {
    if from == to {
        return Err(RelationError::NotFriends);
    }

    let mut to_friends = store.get_friendship_in_tx(tx, to).await?;
    if !to_friends.friends.contains(from) {
        return Err(RelationError::NotFriends);
    }
    let mut from_friends = store.get_friendship_in_tx(tx, from).await?;
    if !from_friends.friends.contains(to) {
        return Err(RelationError::NotFriends);
    }

    to_friends.friends.remove(from);
    from_friends.friends.remove(to);

    store.save_friendship_in_tx(tx, &to_friends).await?;
    store.save_friendship_in_tx(tx, &from_friends).await?;

    tracing::debug!(%from, %to, "friendship removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryRelationStore;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn engine(store: &Arc<MemoryRelationStore>) -> FriendshipTxEngine {
        FriendshipTxEngine::new(store.clone(), store.clone())
    }

    async fn request(store: &MemoryRelationStore, from: &str, to: &str) {
        let mut record = store.get_pending_requests(&uid(to)).await.unwrap();
        record.requesters.insert(uid(from));
        store.save_pending_requests(&record).await.unwrap();
    }

    async fn befriend(store: &MemoryRelationStore, a: &str, b: &str) {
        for (owner, other) in [(a, b), (b, a)] {
            let mut record = store.get_friendship(&uid(owner)).await.unwrap();
            record.friends.insert(uid(other));
            store.save_friendship(&record).await.unwrap();
        }
    }

    async fn friends_of(store: &MemoryRelationStore, owner: &str) -> Vec<UserId> {
        store
            .get_friendship(&uid(owner))
            .await
            .unwrap()
            .friends
            .as_slice()
            .to_vec()
    }

    #[tokio::test]
    async fn accept_makes_both_sides_friends() {
        let store = Arc::new(MemoryRelationStore::new());
        request(&store, "u1", "u2").await;

        engine(&store).accept(&uid("u1"), &uid("u2")).await.unwrap();

        assert!(store.get_pending_requests(&uid("u2")).await.unwrap().requesters.is_empty());
        assert_eq!(friends_of(&store, "u2").await, vec![uid("u1")]);
        assert_eq!(friends_of(&store, "u1").await, vec![uid("u2")]);
    }

    #[tokio::test]
    async fn accept_settles_crossing_requests() {
        let store = Arc::new(MemoryRelationStore::new());
        request(&store, "u1", "u2").await;
        request(&store, "u2", "u1").await;
        request(&store, "u3", "u1").await;
        let engine = engine(&store);

        engine.accept(&uid("u1"), &uid("u2")).await.unwrap();

        assert!(store.get_pending_requests(&uid("u2")).await.unwrap().requesters.is_empty());
        assert_eq!(
            store.get_pending_requests(&uid("u1")).await.unwrap().requesters.as_slice(),
            &[uid("u3")]
        );
        assert_eq!(friends_of(&store, "u1").await, vec![uid("u2")]);
        assert_eq!(friends_of(&store, "u2").await, vec![uid("u1")]);

        let err = engine.accept(&uid("u2"), &uid("u1")).await.unwrap_err();
        assert!(matches!(err, RelationError::NotRequested));
    }

    #[tokio::test]
    async fn accept_without_request_changes_nothing() {
        let store = Arc::new(MemoryRelationStore::new());
        request(&store, "u3", "u2").await;

        let err = engine(&store).accept(&uid("u1"), &uid("u2")).await.unwrap_err();

        assert!(matches!(err, RelationError::NotRequested));
        assert_eq!(
            store.get_pending_requests(&uid("u2")).await.unwrap().requesters.as_slice(),
            &[uid("u3")]
        );
        assert!(!store.has_record(RecordKind::Friendship, &uid("u1")));
        assert!(!store.has_record(RecordKind::Friendship, &uid("u2")));
    }

    #[tokio::test]
    async fn accept_between_friends_keeps_the_request() {
        let store = Arc::new(MemoryRelationStore::new());
        befriend(&store, "u1", "u2").await;
        request(&store, "u1", "u2").await;

        let err = engine(&store).accept(&uid("u1"), &uid("u2")).await.unwrap_err();

        assert!(matches!(err, RelationError::AlreadyFriends));
        // the pending removal is rolled back with the rest
        assert_eq!(
            store.get_pending_requests(&uid("u2")).await.unwrap().requesters.as_slice(),
            &[uid("u1")]
        );
        assert_eq!(friends_of(&store, "u1").await, vec![uid("u2")]);
        assert_eq!(friends_of(&store, "u2").await, vec![uid("u1")]);
    }

    #[tokio::test]
    async fn accept_detects_one_sided_friendship() {
        let store = Arc::new(MemoryRelationStore::new());
        store
            .save_friendship(&Friendship {
                owner: uid("u1"),
                friends: vec![uid("u2")].into(),
            })
            .await
            .unwrap();
        request(&store, "u1", "u2").await;

        let err = engine(&store).accept(&uid("u1"), &uid("u2")).await.unwrap_err();
        assert!(matches!(err, RelationError::AlreadyFriends));
        assert!(friends_of(&store, "u2").await.is_empty());
    }

    #[tokio::test]
    async fn failed_write_rolls_back_the_whole_accept() {
        let store = Arc::new(MemoryRelationStore::new());
        request(&store, "u1", "u2").await;
        store.inject_write_fault(RecordKind::Friendship, &uid("u1"));

        let err = engine(&store).accept(&uid("u1"), &uid("u2")).await.unwrap_err();

        assert!(matches!(err, RelationError::Store(_)));
        assert!(!err.is_rejection());
        assert_eq!(
            store.get_pending_requests(&uid("u2")).await.unwrap().requesters.as_slice(),
            &[uid("u1")]
        );
        assert!(friends_of(&store, "u2").await.is_empty());
    }

    #[tokio::test]
    async fn repeated_accept_reports_consumed_request() {
        let store = Arc::new(MemoryRelationStore::new());
        request(&store, "u1", "u2").await;
        let engine = engine(&store);

        engine.accept(&uid("u1"), &uid("u2")).await.unwrap();
        let err = engine.accept(&uid("u1"), &uid("u2")).await.unwrap_err();

        assert!(matches!(err, RelationError::NotRequested));
        assert_eq!(friends_of(&store, "u1").await, vec![uid("u2")]);
        assert_eq!(friends_of(&store, "u2").await, vec![uid("u1")]);
    }

    #[tokio::test]
    async fn remove_clears_both_sides_only() {
        let store = Arc::new(MemoryRelationStore::new());
        befriend(&store, "u1", "u2").await;
        befriend(&store, "u1", "u3").await;
        befriend(&store, "u2", "u4").await;
        let engine = engine(&store);

        engine.remove(&uid("u1"), &uid("u2")).await.unwrap();

        assert_eq!(friends_of(&store, "u1").await, vec![uid("u3")]);
        assert_eq!(friends_of(&store, "u2").await, vec![uid("u4")]);

        let err = engine.remove(&uid("u1"), &uid("u2")).await.unwrap_err();
        assert!(matches!(err, RelationError::NotFriends));
    }

    #[tokio::test]
    async fn remove_of_one_sided_link_changes_nothing() {
        let store = Arc::new(MemoryRelationStore::new());
        store
            .save_friendship(&Friendship {
                owner: uid("u2"),
                friends: vec![uid("u1")].into(),
            })
            .await
            .unwrap();

        let err = engine(&store).remove(&uid("u1"), &uid("u2")).await.unwrap_err();

        assert!(matches!(err, RelationError::NotFriends));
        assert_eq!(friends_of(&store, "u2").await, vec![uid("u1")]);
    }

    #[tokio::test]
    async fn concurrent_accepts_of_one_request_apply_once() {
        let store = Arc::new(MemoryRelationStore::new());
        request(&store, "u1", "u2").await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        accept_in_tx(&*store, &mut *first, &uid("u1"), &uid("u2"))
            .await
            .unwrap();
        accept_in_tx(&*store, &mut *second, &uid("u1"), &uid("u2"))
            .await
            .unwrap();

        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await,
            Err(StoreError::WriteConflict(_))
        ));
        assert_eq!(friends_of(&store, "u1").await, vec![uid("u2")]);
        assert_eq!(friends_of(&store, "u2").await, vec![uid("u1")]);
    }
}
