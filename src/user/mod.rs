use std::collections::BTreeSet;
use std::future::Future;

use acct_lib::ids;
use acct_lib::sec::authz::permission::{WILDCARD, SUPER_ADMIN_GROUP};
use acct_lib::sec::authz::role::Role;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{self, BoxDynError, GeneralKind, UserKind};

pub mod memory;

pub use memory::MemoryDirectory;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mfa {
    pub totp_secret: Option<String>,
    pub enabled: bool,
    pub secret_issued_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Mfa {
    /// a secret has been handed out but never confirmed with a code
    pub fn pending(&self) -> bool {
        self.totp_secret.is_some() && !self.enabled
    }

    pub fn is_set(&self) -> bool {
        self.totp_secret.is_some() || self.enabled
    }

    pub fn clear(&mut self) {
        *self = Mfa::default();
    }

    pub fn to_api(&self) -> acct_api::users::MfaState {
        acct_api::users::MfaState {
            totp_enabled: self.enabled,
            totp_pending: self.pending(),
            totp_secret_issued_at: self.secret_issued_at,
            totp_confirmed_at: self.confirmed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: ids::UserId,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub password_hash: String,
    pub mfa: Mfa,
    pub role: Role,
    pub groups: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub active: bool,
    pub proxy_uuid: Option<Uuid>,
    pub proxy_uuid_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// an active user with the default role. the directory assigns the id
    /// and timestamps on create
    pub fn new<N, E>(name: N, email: E, password_hash: String) -> Self
    where
        N: Into<String>,
        E: Into<String>,
    {
        User {
            id: String::new(),
            name: name.into(),
            email: email.into(),
            email_verified: false,
            password_hash,
            mfa: Mfa::default(),
            role: Role::default(),
            groups: BTreeSet::new(),
            permissions: BTreeSet::new(),
            active: true,
            proxy_uuid: None,
            proxy_uuid_expires_at: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }

    #[inline]
    pub fn level(&self) -> i32 {
        self.role.level()
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }

    pub fn is_super_admin(&self) -> bool {
        self.role.is_admin_equivalent()
            && self.permissions.contains(WILDCARD)
            && self.groups.contains(SUPER_ADMIN_GROUP)
    }

    /// the account name shown in an authenticator app
    pub fn totp_account(&self) -> &str {
        if !self.email.is_empty() {
            &self.email
        } else if !self.name.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    pub fn to_api(&self) -> acct_api::users::User {
        acct_api::users::User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            email_verified: self.email_verified,
            mfa_enabled: self.mfa.enabled,
            mfa: self.mfa.to_api(),
            role: self.role,
            level: self.level(),
            groups: self.groups.iter().cloned().collect(),
            permissions: self.permissions.iter().cloned().collect(),
            active: self.active,
            proxy_uuid: self.proxy_uuid,
            proxy_uuid_expires_at: self.proxy_uuid_expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("email already exists")]
    EmailExists,

    #[error("name already exists")]
    NameExists,

    #[error("invalid name")]
    InvalidName,

    #[error("user was not found")]
    NotFound,

    #[error("directory call was cancelled")]
    Cancelled,

    #[error(transparent)]
    Backend(BoxDynError),
}

impl From<DirectoryError> for error::Error {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::EmailExists => error::Error::api(UserKind::EmailAlreadyExists),
            DirectoryError::NameExists => error::Error::api(UserKind::NameAlreadyExists),
            DirectoryError::InvalidName => error::Error::api(UserKind::InvalidName),
            DirectoryError::NotFound => error::Error::api(UserKind::NotFound),
            DirectoryError::Cancelled => error::Error::api(GeneralKind::Cancelled),
            DirectoryError::Backend(err) => error::Error::new()
                .context("user directory failure")
                .source(err),
        }
    }
}

/// storage for user records. names are unique ignoring case, emails are
/// unique ignoring case when not empty
pub trait UserDirectory: std::fmt::Debug + Send + Sync {
    fn create(&self, user: User) -> BoxFuture<'_, Result<User, DirectoryError>>;

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<User, DirectoryError>>;

    fn get_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<User, DirectoryError>>;

    fn get_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<User, DirectoryError>>;

    fn update(&self, user: User) -> BoxFuture<'_, Result<User, DirectoryError>>;

    fn list(&self) -> BoxFuture<'_, Result<Vec<User>, DirectoryError>>;
}

/// a directory bound to the cancellation token of the operation using it
pub struct Users<'a> {
    dir: &'a dyn UserDirectory,
    cancel: &'a CancellationToken,
}

impl<'a> Users<'a> {
    pub fn new(dir: &'a dyn UserDirectory, cancel: &'a CancellationToken) -> Self {
        Users { dir, cancel }
    }

    async fn guard<T, F>(&self, fut: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = Result<T, DirectoryError>>
    {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(DirectoryError::Cancelled),
            result = fut => result,
        }
    }

    pub async fn create(&self, user: User) -> Result<User, DirectoryError> {
        self.guard(self.dir.create(user)).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<User, DirectoryError> {
        self.guard(self.dir.get_by_id(id)).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        self.guard(self.dir.get_by_email(email)).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<User, DirectoryError> {
        self.guard(self.dir.get_by_name(name)).await
    }

    pub async fn update(&self, user: User) -> Result<User, DirectoryError> {
        self.guard(self.dir.update(user)).await
    }

    pub async fn list(&self) -> Result<Vec<User>, DirectoryError> {
        self.guard(self.dir.list()).await
    }

    /// looks up by name first and falls back to email
    pub async fn resolve(&self, identifier: &str) -> Result<User, DirectoryError> {
        match self.get_by_name(identifier).await {
            Ok(user) => Ok(user),
            Err(DirectoryError::NotFound) => self.get_by_email(identifier).await,
            Err(err) => Err(err),
        }
    }
}
