use super::error::*;
use super::handler;
use crate::application_port::{CallContext, TokenVerifier};
use crate::domain_model::UserId;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 4 * 1024;

/// Friend routes, to be mounted under `/api/v1`.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list_friends = warp::path!("friends")
        .and(warp::get())
        .and(with_verification(server.token_verifier.clone()))
        .and(with_context(server.clone()))
        .and(with(server.relationship_service.clone()))
        .and_then(handler::list_friends);

    let list_requests = warp::path!("friends" / "requests")
        .and(warp::get())
        .and(with_verification(server.token_verifier.clone()))
        .and(with_context(server.clone()))
        .and(with(server.relationship_service.clone()))
        .and_then(handler::list_pending_requests);

    let create_request = warp::path!("friends" / "requests")
        .and(warp::post())
        .and(json_body())
        .and(with_verification(server.token_verifier.clone()))
        .and(with_context(server.clone()))
        .and(with(server.relationship_service.clone()))
        .and_then(handler::create_request);

    let accept_request = warp::path!("friends" / "requests" / "accept")
        .and(warp::post())
        .and(json_body())
        .and(with_verification(server.token_verifier.clone()))
        .and(with_context(server.clone()))
        .and(with(server.relationship_service.clone()))
        .and_then(handler::accept_request);

    let decline_request = warp::path!("friends" / "requests" / "decline")
        .and(warp::post())
        .and(json_body())
        .and(with_verification(server.token_verifier.clone()))
        .and(with_context(server.clone()))
        .and(with(server.relationship_service.clone()))
        .and_then(handler::decline_request);

    let remove_friend = warp::path!("friends" / "remove")
        .and(warp::post())
        .and(json_body())
        .and(with_verification(server.token_verifier.clone()))
        .and(with_context(server.clone()))
        .and(with(server.relationship_service.clone()))
        .and_then(handler::remove_friend);

    list_friends
        .or(list_requests)
        .or(create_request)
        .or(accept_request)
        .or(decline_request)
        .or(remove_friend)
}

fn json_body() -> impl Filter<Extract = (handler::FriendRequestBody,), Error = warp::Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_context(
    server: Arc<Server>,
) -> impl Filter<Extract = (CallContext,), Error = Infallible> + Clone {
    warp::any().map(move || server.request_context())
}

fn with_verification(
    token_verifier: Arc<dyn TokenVerifier>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |token: String| {
        let token_verifier = token_verifier.clone();
        async move {
            if let Some(token) = token.strip_prefix("Bearer ") {
                let user_id = token_verifier
                    .verify_token(token)
                    .await
                    .map_err(ApiError::from)
                    .map_err(reject::custom)?;
                Ok(user_id)
            } else {
                Err(reject::custom(ApiError::new(
                    ApiErrorCode::InvalidToken,
                    "expected a bearer token",
                )))
            }
        }
    })
}
