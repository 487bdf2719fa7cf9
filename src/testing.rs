use std::sync::{Arc, Mutex, PoisonError};

use acct_lib::sec::authz::role::Role;
use chrono::DateTime;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::config;
use crate::email::{EmailMessage, EmailSender};
use crate::error::BoxDynError;
use crate::sec::authn::{password, session, totp};
use crate::state::{ArcShared, Shared};
use crate::time::{Clock, ManualClock};
use crate::user::{User, Users};

/// keeps every message it is handed. can be switched into failing
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<bool>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }
}

impl EmailSender for RecordingSender {
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, Result<(), BoxDynError>> {
        Box::pin(async move {
            if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
                return Err("smtp unavailable".into());
            }

            self.sent.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.clone());

            Ok(())
        })
    }
}

/// pulls the 64 char hex token out of a rendered email
pub fn token_from(message: &EmailMessage) -> String {
    message.plain_body
        .split(|ch: char| !ch.is_ascii_hexdigit())
        .find(|part| part.len() == 64)
        .expect("email did not contain a token")
        .to_owned()
}

pub struct Harness {
    pub state: ArcShared,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<RecordingSender>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(config::Settings::default())
    }

    pub fn with_settings(settings: config::Settings) -> Self {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mailer = Arc::new(RecordingSender::default());

        let state = Shared::builder()
            .clock(clock.clone())
            .mailer(mailer.clone())
            .build(&settings)
            .unwrap();

        Harness {
            state: Arc::new(state),
            clock,
            mailer,
            cancel: CancellationToken::new(),
        }
    }

    pub fn users(&self) -> Users<'_> {
        self.state.users(&self.cancel)
    }

    /// a verified, active user without a usable password
    pub async fn create_user(&self, name: &str, email: &str, role: Role) -> User {
        let mut user = User::new(name, email, String::new());
        user.role = role;
        user.email_verified = true;

        self.users().create(user).await.unwrap()
    }

    pub async fn create_user_with_password(&self, name: &str, email: &str, given: &str) -> User {
        let mut user = User::new(name, email, password::hash(given.to_owned()).await.unwrap());
        user.email_verified = true;

        self.users().create(user).await.unwrap()
    }

    pub fn session_for(&self, user: &User) -> String {
        session::issue(&self.state, user).unwrap().token
    }

    /// turns on mfa for the named user and returns the secret
    pub async fn enable_mfa(&self, name: &str) -> String {
        let mut user = self.users().get_by_name(name).await.unwrap();
        let secret = totp::create_secret().unwrap();

        user.mfa.totp_secret = Some(secret.clone());
        user.mfa.enabled = true;
        user.mfa.secret_issued_at = Some(self.clock.now());
        user.mfa.confirmed_at = Some(self.clock.now());

        self.users().update(user).await.unwrap();

        secret
    }

    pub fn code_now(&self, secret: &str) -> String {
        totp::code_at(secret, self.clock.now()).unwrap()
    }
}
