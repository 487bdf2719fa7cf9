use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config;
use crate::email::{EmailSender, LogSender};
use crate::error;
use crate::sec;
use crate::sec::authn::token::{OsTokens, TokenSource};
use crate::template::Templates;
use crate::time::{Clock, SystemClock};
use crate::user::{MemoryDirectory, UserDirectory, Users};

#[derive(Debug)]
pub struct Shared {
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn EmailSender>,
    templates: Templates,
    clock: Arc<dyn Clock>,
    sec: sec::state::Sec,
    accounts: config::Accounts,
}

pub type ArcShared = Arc<Shared>;

impl Shared {
    pub fn from_config(config: &config::Config) -> error::ApiResult<Shared> {
        Shared::builder().build(&config.settings)
    }

    pub fn builder() -> SharedBuilder {
        SharedBuilder::default()
    }

    /// the directory bound to the caller's cancellation token
    pub fn users<'a>(&'a self, cancel: &'a CancellationToken) -> Users<'a> {
        Users::new(self.users.as_ref(), cancel)
    }

    pub fn mailer(&self) -> &dyn EmailSender {
        self.mailer.as_ref()
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn sec(&self) -> &sec::state::Sec {
        &self.sec
    }

    pub fn accounts(&self) -> &config::Accounts {
        &self.accounts
    }
}

/// collaborators left unset fall back to the production ones
#[derive(Debug, Default)]
pub struct SharedBuilder {
    clock: Option<Arc<dyn Clock>>,
    tokens: Option<Arc<dyn TokenSource>>,
    users: Option<Arc<dyn UserDirectory>>,
    mailer: Option<Arc<dyn EmailSender>>,
}

impl SharedBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn users(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn EmailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn build(self, settings: &config::Settings) -> error::ApiResult<Shared> {
        tracing::debug!("creating Shared state");

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let tokens = self.tokens.unwrap_or_else(|| Arc::new(OsTokens));
        let users = self.users
            .unwrap_or_else(|| Arc::new(MemoryDirectory::new(Arc::clone(&clock))));
        let mailer = self.mailer.unwrap_or_else(|| Arc::new(LogSender));

        Ok(Shared {
            users,
            mailer,
            templates: Templates::from_config(&settings.templates)?,
            sec: sec::state::Sec::new(settings.sec.clone(), Arc::clone(&clock), tokens),
            clock,
            accounts: settings.accounts.clone(),
        })
    }
}
