use std::path::PathBuf;

use serde::Deserialize;

/// ttl values are in seconds
#[derive(Debug, Deserialize)]
pub struct Sec {
    pub session_ttl: Option<u64>,
    pub mfa_challenge_ttl: Option<u64>,
    pub verification_ttl: Option<u64>,
    pub reset_ttl: Option<u64>,
    pub totp_issuer: Option<String>,
    pub email_verification: Option<bool>,
    pub super_admin_guard: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct Accounts {
    pub root_email: Option<String>,
    pub demo_email: Option<String>,
    pub sandbox_email: Option<String>,
    pub rotation_window: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Templates {
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Jobs {
    pub token_sweep: Option<String>,
    pub demo_rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub sec: Option<Sec>,
    pub accounts: Option<Accounts>,
    pub templates: Option<Templates>,
    pub jobs: Option<Jobs>,
}
