use std::sync::Arc;

use crate::config;
use crate::time::Clock;

use super::authn::mfa::Challenge;
use super::authn::session::SessionData;
use super::authn::token::{EmailBound, TokenSource, TokenStore};
use super::authz::settings::SettingsStore;

/// every short lived credential the service hands out plus the admin
/// settings document
#[derive(Debug)]
pub struct Sec {
    sessions: TokenStore<SessionData>,
    challenges: TokenStore<Challenge>,
    verifications: TokenStore<EmailBound>,
    resets: TokenStore<EmailBound>,
    settings: SettingsStore,
    tokens: Arc<dyn TokenSource>,
    policy: config::Sec,
}

impl Sec {
    pub fn new(policy: config::Sec, clock: Arc<dyn Clock>, tokens: Arc<dyn TokenSource>) -> Self {
        tracing::debug!("creating Sec state");

        Sec {
            sessions: TokenStore::new("sessions", Arc::clone(&clock)),
            challenges: TokenStore::new("mfa_challenges", Arc::clone(&clock)),
            verifications: TokenStore::new("email_verifications", Arc::clone(&clock)),
            resets: TokenStore::new("password_resets", clock),
            settings: SettingsStore::new(),
            tokens,
            policy,
        }
    }

    pub fn sessions(&self) -> &TokenStore<SessionData> {
        &self.sessions
    }

    pub fn challenges(&self) -> &TokenStore<Challenge> {
        &self.challenges
    }

    pub fn verifications(&self) -> &TokenStore<EmailBound> {
        &self.verifications
    }

    pub fn resets(&self) -> &TokenStore<EmailBound> {
        &self.resets
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn tokens(&self) -> &dyn TokenSource {
        self.tokens.as_ref()
    }

    pub fn policy(&self) -> &config::Sec {
        &self.policy
    }
}
