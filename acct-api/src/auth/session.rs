use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::users::User;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub identifier: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub totp_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// returned by every operation that ends in a new session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticated {
    pub message: String,
    pub session: SessionGrant,
    pub user: User,

    /// present when the user has not finished enrolling in mfa
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa: Option<ChallengeGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSession {
    pub expires_at: DateTime<Utc>,
    pub user: User,
}
