use crate::domain_model::*;
use crate::domain_port::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    ids: &'a [UserId],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    users: Vec<Profile>,
}

/// Client of the users service batch endpoint.
pub struct HttpProfileLookup {
    client: reqwest::Client,
    batch_url: String,
}

impl HttpProfileLookup {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            batch_url: batch_url(base_url),
        })
    }
}

fn batch_url(base_url: &str) -> String {
    format!("{}/api/v1/users/batch", base_url.trim_end_matches('/'))
}

#[async_trait::async_trait]
impl ProfileLookup for HttpProfileLookup {
    async fn resolve(&self, ids: &[UserId]) -> Result<Vec<Profile>, LookupError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.batch_url)
            .json(&BatchRequest { ids })
            .send()
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        let body: BatchResponse = response
            .json()
            .await
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;

        Ok(body.users)
    }
}
