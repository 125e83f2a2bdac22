use crate::domain_model::UserId;
use serde::Deserialize;

pub const USER_DELETE_EVENT: &str = "user.delete";

/// Envelope published by the users service on its event topic.
#[derive(Debug, Deserialize)]
pub struct UserEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UserDeleted {
    pub id: UserId,
}
