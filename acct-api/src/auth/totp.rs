use serde::{Serialize, Deserialize};

use crate::users::{User, MfaState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionTotp {
    pub token: String,

    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpProvision {
    pub secret: String,
    pub uri: String,
    pub issuer: String,
    pub account: String,
    pub mfa_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyTotp {
    pub token: String,
    pub code: String,
}

/// any of the three can identify the user, checked in field order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaStatusQuery {
    #[serde(default)]
    pub session_token: Option<String>,

    #[serde(default)]
    pub mfa_token: Option<String>,

    #[serde(default)]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaStatus {
    pub mfa: MfaState,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaDisabled {
    pub message: String,
    pub user: User,
}
