use super::error::*;
use crate::application_port::{CallContext, RelationshipService};
use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// `data` of mutations that return nothing; serialises as `{}`.
#[derive(Debug, Serialize)]
pub struct EmptyResponse {}

/// Request body of every mutation. Only a JSON object is accepted; serde's
/// derived sequence form (`["u2"]`) would otherwise pass as this struct.
#[derive(Debug, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct FriendRequestBody {
    pub friend_id: String,
}

impl TryFrom<Map<String, Value>> for FriendRequestBody {
    type Error = String;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.remove("friend_id") {
            None => Ok(Self {
                friend_id: String::new(),
            }),
            Some(Value::String(friend_id)) => Ok(Self { friend_id }),
            Some(other) => Err(format!("friend_id: expected a string, found {other}")),
        }
    }
}

impl FriendRequestBody {
    fn validate(self) -> Result<UserId, ApiError> {
        if self.friend_id.is_empty() {
            return Err(ApiError::new(
                ApiErrorCode::InvalidRequest,
                r#""friend_id": cannot be empty"#,
            ));
        }
        UserId::new(self.friend_id).map_err(|e| {
            ApiError::new(ApiErrorCode::InvalidRequest, format!(r#""friend_id": {e}"#))
        })
    }
}

pub async fn list_friends(
    user_id: UserId,
    ctx: CallContext,
    relationship_service: Arc<dyn RelationshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let friends = relationship_service
        .list_friends(&ctx, &user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(friends)))
}

pub async fn list_pending_requests(
    user_id: UserId,
    ctx: CallContext,
    relationship_service: Arc<dyn RelationshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let requesters = relationship_service
        .list_pending_requests(&ctx, &user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(requesters)))
}

/// The caller asks `friend_id` to become friends.
pub async fn create_request(
    body: FriendRequestBody,
    user_id: UserId,
    ctx: CallContext,
    relationship_service: Arc<dyn RelationshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let friend_id = body.validate().map_err(reject::custom)?;

    relationship_service
        .create_request(&ctx, &user_id, &friend_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(EmptyResponse {})))
}

/// The caller accepts the request `friend_id` sent them.
pub async fn accept_request(
    body: FriendRequestBody,
    user_id: UserId,
    ctx: CallContext,
    relationship_service: Arc<dyn RelationshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let friend_id = body.validate().map_err(reject::custom)?;

    relationship_service
        .accept_friend(&ctx, &friend_id, &user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(EmptyResponse {})))
}

pub async fn decline_request(
    body: FriendRequestBody,
    user_id: UserId,
    ctx: CallContext,
    relationship_service: Arc<dyn RelationshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let friend_id = body.validate().map_err(reject::custom)?;

    relationship_service
        .decline_request(&ctx, &friend_id, &user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(EmptyResponse {})))
}

pub async fn remove_friend(
    body: FriendRequestBody,
    user_id: UserId,
    ctx: CallContext,
    relationship_service: Arc<dyn RelationshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let friend_id = body.validate().map_err(reject::custom)?;

    relationship_service
        .remove_friend(&ctx, &user_id, &friend_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(EmptyResponse {})))
}
