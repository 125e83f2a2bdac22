use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("users service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid users service response: {0}")]
    InvalidResponse(String),
}

#[async_trait::async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Resolves the given ids in one call. Unknown ids are left out of the
    /// result; the order of the result is unspecified.
    async fn resolve(&self, ids: &[UserId]) -> Result<Vec<Profile>, LookupError>;
}
