use crate::application_port::CallContext;
use crate::domain_model::*;
use crate::domain_port::{LookupError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    #[error("user is not in friend requests")]
    NotRequested,
    #[error("users are already friends")]
    AlreadyFriends,
    #[error("users are not friends")]
    NotFriends,
    #[error("user is already in friend requests")]
    DuplicateRequest,
    #[error("you cannot be friend with yourself")]
    SelfReference,
    #[error("store error: {0}")]
    Store(String),
    #[error("lookup error: {0}")]
    Lookup(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl RelationError {
    /// Expected refusals caused by the caller's request, as opposed to faults.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RelationError::NotRequested
                | RelationError::AlreadyFriends
                | RelationError::NotFriends
                | RelationError::DuplicateRequest
                | RelationError::SelfReference
        )
    }
}

impl From<StoreError> for RelationError {
    fn from(err: StoreError) -> Self {
        RelationError::Store(err.to_string())
    }
}

impl From<LookupError> for RelationError {
    fn from(err: LookupError) -> Self {
        RelationError::Lookup(err.to_string())
    }
}

/// Friend requests and friendships as seen by the front door.
///
/// `from` is always the user who sent the request, `to` the user who received
/// it. For removal the two are interchangeable.
#[async_trait::async_trait]
pub trait RelationshipService: Send + Sync {
    async fn list_friends(
        &self,
        ctx: &CallContext,
        user_id: &UserId,
    ) -> Result<Vec<Profile>, RelationError>;

    async fn list_pending_requests(
        &self,
        ctx: &CallContext,
        user_id: &UserId,
    ) -> Result<Vec<Profile>, RelationError>;

    async fn create_request(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError>;

    async fn decline_request(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError>;

    async fn accept_friend(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError>;

    async fn remove_friend(
        &self,
        ctx: &CallContext,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RelationError>;
}
