use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let api_error = if let Some(e) = err.find::<ApiError>() {
        e.clone()
    } else if err.is_not_found() {
        ApiError::new(ApiErrorCode::NotFound, "no such route")
    } else if let Some(e) = err.find::<warp::reject::MissingHeader>() {
        ApiError::new(ApiErrorCode::InvalidToken, e.to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        ApiError::new(ApiErrorCode::InvalidRequest, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        ApiError::new(ApiErrorCode::InvalidRequest, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
        ApiError::new(ApiErrorCode::InvalidRequest, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::new(ApiErrorCode::MethodNotAllowed, "method not allowed")
    } else {
        error!(rejection = ?err, "unhandled rejection");
        ApiError::new(ApiErrorCode::InternalError, "internal error")
    };

    let status = api_error.code.status();
    let json = warp::reply::json(&ApiResponse::<()>::err(api_error));
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Logs the cause and hides it from the caller.
    pub fn internal<E: std::fmt::Display>(error: E) -> Self {
        error!("internal error: {}", error);
        Self::new(ApiErrorCode::InternalError, "internal error")
    }
}

impl reject::Reject for ApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Malformed request")]
    InvalidRequest,
    #[error("User is not in friend requests")]
    NotRequested,
    #[error("Users are already friends")]
    AlreadyFriends,
    #[error("Users are not friends")]
    NotFriends,
    #[error("User is already in friend requests")]
    DuplicateRequest,
    #[error("Cannot befriend yourself")]
    SelfReference,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Request timed out")]
    Timeout,
    #[error("Service unavailable")]
    Unavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidRequest
            | ApiErrorCode::NotRequested
            | ApiErrorCode::AlreadyFriends
            | ApiErrorCode::NotFriends
            | ApiErrorCode::DuplicateRequest
            | ApiErrorCode::SelfReference => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidToken | ApiErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RelationError> for ApiError {
    fn from(error: RelationError) -> Self {
        let code = match &error {
            RelationError::NotRequested => ApiErrorCode::NotRequested,
            RelationError::AlreadyFriends => ApiErrorCode::AlreadyFriends,
            RelationError::NotFriends => ApiErrorCode::NotFriends,
            RelationError::DuplicateRequest => ApiErrorCode::DuplicateRequest,
            RelationError::SelfReference => ApiErrorCode::SelfReference,
            RelationError::DeadlineExceeded => {
                warn!("request deadline exceeded");
                ApiErrorCode::Timeout
            }
            RelationError::Cancelled => ApiErrorCode::Unavailable,
            RelationError::Store(_) | RelationError::Lookup(_) => {
                return ApiError::internal(&error);
            }
        };
        ApiError::new(code, error.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::TokenExpired => ApiError::new(ApiErrorCode::TokenExpired, error.to_string()),
            AuthError::TokenInvalid => ApiError::new(ApiErrorCode::InvalidToken, error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_client_errors_with_their_message() {
        let err = ApiError::from(RelationError::DuplicateRequest);
        assert_eq!(err.code, ApiErrorCode::DuplicateRequest);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, RelationError::DuplicateRequest.to_string());
    }

    #[test]
    fn faults_hide_their_cause() {
        let err = ApiError::from(RelationError::Store("connection reset".into()));
        assert_eq!(err.code.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("connection reset"));

        let err = ApiError::from(RelationError::Lookup("users down".into()));
        assert_eq!(err.code, ApiErrorCode::InternalError);
    }

    #[test]
    fn deadline_maps_to_gateway_timeout() {
        let err = ApiError::from(RelationError::DeadlineExceeded);
        assert_eq!(err.code.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        assert_eq!(
            ApiError::from(AuthError::TokenExpired).code.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::TokenInvalid).code,
            ApiErrorCode::InvalidToken
        );
    }
}
