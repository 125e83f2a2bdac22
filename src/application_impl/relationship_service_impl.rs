use crate::application_impl::FriendshipTxEngine;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RealRelationshipService {
    relation_store: Arc<dyn RelationStore>,
    tx_manager: Arc<dyn TxManager>,
    profile_lookup: Arc<dyn ProfileLookup>,
    engine: FriendshipTxEngine,
}

impl RealRelationshipService {
    pub fn new(
        relation_store: Arc<dyn RelationStore>,
        tx_manager: Arc<dyn TxManager>,
        profile_lookup: Arc<dyn ProfileLookup>,
    ) -> Self {
        let engine = FriendshipTxEngine::new(relation_store.clone(), tx_manager.clone());
        Self {
            relation_store,
            tx_manager,
            profile_lookup,
            engine,
        }
    }

    /// One batched lookup; result follows `ids` order, unknown ids dropped.
    async fn resolve_profiles(&self, ids: &IdSet) -> Result<Vec<Profile>, RelationError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<UserId, Profile> = self
            .profile_lookup
            .resolve(ids.as_slice())
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

async fn create_request_in_tx(
    store: &dyn RelationStore,
    tx: &mut dyn StorageTx,
    from: &UserId,
    to: &UserId,
) -> Result<(), RelationError> {
    if from == to {
        return Err(RelationError::SelfReference);
    }

    let mut requests = store.get_pending_requests_in_tx(tx, to).await?;
    if requests.requesters.contains(from) {
        return Err(RelationError::DuplicateRequest);
    }

    let to_friends = store.get_friendship_in_tx(tx, to).await?;
    if to_friends.friends.contains(from) {
        return Err(RelationError::AlreadyFriends);
    }
    let from_friends = store.get_friendship_in_tx(tx, from).await?;
    if from_friends.friends.contains(to) {
        return Err(RelationError::AlreadyFriends);
    }

    requests.requesters.insert(from.clone());
    store.save_pending_requests_in_tx(tx, &requests).await?;
    Ok(())
}

async fn decline_request_in_tx(
    store: &dyn RelationStore,
    tx: &mut dyn StorageTx,
    from: &UserId,
    to: &UserId,
) -> Result<(), RelationError> {
    let mut requests = store.get_pending_requests_in_tx(tx, to).await?;
    if !requests.requesters.remove(from) {
        return Err(RelationError::NotRequested);
    }
    store.save_pending_requests_in_tx(tx, &requests).await?;
    Ok(())
}

#[async_trait::async_trait]
impl RelationshipService for RealRelationshipService {
    async fn list_friends(
        &self,
        ctx: &CallContext,
        user_id: &UserId,
    ) -> Result<Vec<Profile>, RelationError> {
        ctx.run(async {
            let friendship = self.relation_store.get_friendship(user_id).await?;
            self.resolve_profiles(&friendship.friends).await
        })
        .await
    }

    async fn list_pending_requests(
        &self,
        ctx: &CallContext,
        user_id: &UserId,
    ) -> Result<Vec<Profile>, RelationError> {
        ctx.run(async {
            let requests = self.relation_store.get_pending_requests(user_id).await?;
            self.resolve_profiles(&requests.requesters).await
        })
        .await
    }

    async fn create_request(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError> {
        let store = self.relation_store.clone();
        let (from, to) = (from.clone(), to.clone());

        ctx.run(run_in_tx(self.tx_manager.as_ref(), move |tx| {
            Box::pin(async move { create_request_in_tx(store.as_ref(), tx, &from, &to).await })
        }))
        .await
    }

    async fn decline_request(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError> {
        let store = self.relation_store.clone();
        let (from, to) = (from.clone(), to.clone());

        ctx.run(run_in_tx(self.tx_manager.as_ref(), move |tx| {
            Box::pin(async move { decline_request_in_tx(store.as_ref(), tx, &from, &to).await })
        }))
        .await
    }

    async fn accept_friend(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError> {
        ctx.run(self.engine.accept(from, to)).await
    }

    async fn remove_friend(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError> {
        ctx.run(self.engine.remove(from, to)).await
    }
}
