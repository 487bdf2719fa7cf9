use acct_lib::ids;
use acct_lib::sec::authz::role::Role;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaState {
    pub totp_enabled: bool,
    pub totp_pending: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_secret_issued_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_confirmed_at: Option<DateTime<Utc>>,
}

/// the view of a user that leaves the service. no password hash or totp
/// secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: ids::UserId,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    pub mfa: MfaState,
    pub role: Role,
    pub level: i32,
    pub groups: Vec<String>,
    pub permissions: Vec<String>,
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_uuid: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_uuid_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: String,
    pub email: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub proxy_uuid: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,
}

/// raw role change request. the pair is normalized before it is applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRole {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub level: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperAdminCount {
    pub count: usize,
}
