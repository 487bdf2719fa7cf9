use http::StatusCode;
use serde::{Serialize, Deserialize};
use strum::{AsRefStr as StrumAsRefStr};

use crate::sec::settings::AdminSettings;

#[derive(
    Debug, Clone, PartialEq, Eq,
    StrumAsRefStr,
    Serialize, Deserialize
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    MissingCredentials,
    InvalidCredentials,
    PasswordRequired,
    EmailNotVerified,

    MfaCodeRequired,
    InvalidMfaCode,
    MfaTokenRequired,
    InvalidMfaToken,
    MfaAlreadyEnabled,
    MfaSecretMissing,
    MfaNotEnabled,

    SessionTokenRequired,
    InvalidSession,
    InvalidToken,

    HashFailure,
    SessionCreationFailed,
    VerificationEmailFailed,
    VerificationFailed,
    PasswordResetFailed,
    MfaProvisionFailed,
}

impl std::fmt::Display for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_ref(), f)
    }
}

impl From<&AuthKind> for StatusCode {
    fn from(kind: &AuthKind) -> Self {
        match kind {
            AuthKind::MissingCredentials |
            AuthKind::PasswordRequired |
            AuthKind::MfaTokenRequired |
            AuthKind::MfaSecretMissing |
            AuthKind::MfaNotEnabled |
            AuthKind::InvalidToken => StatusCode::BAD_REQUEST,
            AuthKind::InvalidCredentials |
            AuthKind::EmailNotVerified |
            AuthKind::MfaCodeRequired |
            AuthKind::InvalidMfaCode |
            AuthKind::InvalidMfaToken |
            AuthKind::SessionTokenRequired |
            AuthKind::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthKind::MfaAlreadyEnabled => StatusCode::CONFLICT,
            AuthKind::HashFailure |
            AuthKind::SessionCreationFailed |
            AuthKind::VerificationEmailFailed |
            AuthKind::VerificationFailed |
            AuthKind::PasswordResetFailed |
            AuthKind::MfaProvisionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq,
    StrumAsRefStr,
    Serialize, Deserialize
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SecKind {
    Forbidden,
    AccountSuspended,
    ReadOnlyAccount,
    RootEmailEnforced,
    RootOnly,

    InvalidPermissionKey,
    VersionConflict,
    SuperAdminGuardDisabled,
}

impl std::fmt::Display for SecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_ref(), f)
    }
}

impl From<&SecKind> for StatusCode {
    fn from(kind: &SecKind) -> Self {
        match kind {
            SecKind::Forbidden |
            SecKind::AccountSuspended |
            SecKind::ReadOnlyAccount |
            SecKind::RootEmailEnforced |
            SecKind::RootOnly => StatusCode::FORBIDDEN,
            SecKind::InvalidPermissionKey |
            SecKind::SuperAdminGuardDisabled => StatusCode::BAD_REQUEST,
            SecKind::VersionConflict => StatusCode::CONFLICT,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq,
    StrumAsRefStr,
    Serialize, Deserialize
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    NameRequired,
    EmailRequired,
    InvalidName,
    InvalidEmail,
    InvalidUuid,
    PasswordTooShort,

    EmailAlreadyExists,
    NameAlreadyExists,

    #[strum(serialize = "user_not_found")]
    #[serde(rename = "user_not_found")]
    NotFound,
    SandboxMissing,

    RootProtected,
    CannotPauseSelf,
    LastSuperAdmin,

    #[strum(serialize = "user_creation_failed")]
    #[serde(rename = "user_creation_failed")]
    CreationFailed,
    #[strum(serialize = "user_update_failed")]
    #[serde(rename = "user_update_failed")]
    UpdateFailed,
}

impl std::fmt::Display for UserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_ref(), f)
    }
}

impl From<&UserKind> for StatusCode {
    fn from(kind: &UserKind) -> Self {
        match kind {
            UserKind::NameRequired |
            UserKind::EmailRequired |
            UserKind::InvalidName |
            UserKind::InvalidEmail |
            UserKind::InvalidUuid |
            UserKind::PasswordTooShort |
            UserKind::CannotPauseSelf => StatusCode::BAD_REQUEST,
            UserKind::EmailAlreadyExists |
            UserKind::NameAlreadyExists |
            UserKind::LastSuperAdmin => StatusCode::CONFLICT,
            UserKind::NotFound |
            UserKind::SandboxMissing => StatusCode::NOT_FOUND,
            UserKind::RootProtected => StatusCode::FORBIDDEN,
            UserKind::CreationFailed |
            UserKind::UpdateFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq,
    StrumAsRefStr,
    Serialize, Deserialize
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GeneralKind {
    InternalFailure,
    Cancelled,
    InvalidRequest,
}

impl std::fmt::Display for GeneralKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_ref(), f)
    }
}

impl From<&GeneralKind> for StatusCode {
    fn from(kind: &GeneralKind) -> StatusCode {
        match kind {
            GeneralKind::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
            GeneralKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
            GeneralKind::InvalidRequest => StatusCode::BAD_REQUEST,
        }
    }
}

/// every code is unique across the groups so the wire form is just the
/// code string
#[derive(
    Debug, Clone, PartialEq, Eq,
    Serialize, Deserialize
)]
#[serde(untagged)]
pub enum ApiErrorKind {
    General(GeneralKind),
    Auth(AuthKind),
    Sec(SecKind),
    User(UserKind),
}

impl ApiErrorKind {
    pub fn code(&self) -> &str {
        match self {
            ApiErrorKind::General(v) => v.as_ref(),
            ApiErrorKind::Auth(v) => v.as_ref(),
            ApiErrorKind::Sec(v) => v.as_ref(),
            ApiErrorKind::User(v) => v.as_ref(),
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.code(), f)
    }
}

impl From<GeneralKind> for ApiErrorKind {
    fn from(v: GeneralKind) -> Self {
        ApiErrorKind::General(v)
    }
}

impl From<AuthKind> for ApiErrorKind {
    fn from(v: AuthKind) -> Self {
        ApiErrorKind::Auth(v)
    }
}

impl From<SecKind> for ApiErrorKind {
    fn from(v: SecKind) -> Self {
        ApiErrorKind::Sec(v)
    }
}

impl From<UserKind> for ApiErrorKind {
    fn from(v: UserKind) -> Self {
        ApiErrorKind::User(v)
    }
}

impl From<&ApiErrorKind> for StatusCode {
    fn from(kind: &ApiErrorKind) -> Self {
        match kind {
            ApiErrorKind::General(v) => v.into(),
            ApiErrorKind::Auth(v) => v.into(),
            ApiErrorKind::Sec(v) => v.into(),
            ApiErrorKind::User(v) => v.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detail {
    Keys(Vec<String>),
    Settings(AdminSettings),
}

impl Detail {
    pub fn with_key(key: impl Into<String>) -> Self {
        Detail::Keys(vec![key.into()])
    }
}

impl std::fmt::Display for Detail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Detail::Keys(list) => {
                let mut iter = list.iter();

                if let Some(first) = iter.next() {
                    write!(f, "{}", first)?;

                    while let Some(key) = iter.next() {
                        write!(f, ",{}", key)?;
                    }
                }
            },
            Detail::Settings(settings) => {
                write!(f, "current version {}", settings.version)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(rename = "code")]
    kind: ApiErrorKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<Detail>,

    #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl ApiError {
    pub fn new() -> Self {
        ApiError {
            kind: ApiErrorKind::General(GeneralKind::InternalFailure),
            detail: None,
            msg: None
        }
    }

    pub fn with_kind<K>(mut self, kind: K) -> Self
    where
        K: Into<ApiErrorKind>
    {
        self.kind = kind.into();
        self
    }

    pub fn with_detail(mut self, detail: Detail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_message<M>(mut self, msg: M) -> Self
    where
        M: Into<String>
    {
        self.msg = Some(msg.into());
        self
    }

    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }

    pub fn status(&self) -> StatusCode {
        (&self.kind).into()
    }

    pub fn detail(&self) -> Option<&Detail> {
        self.detail.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.msg.as_deref()
    }
}

impl std::default::Default for ApiError {
    fn default() -> Self {
        ApiError::new()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }

        if let Some(msg) = &self.msg {
            write!(f, ": {}", msg)?;
        }

        Ok(())
    }
}

impl<K> From<K> for ApiError
where
    K: Into<ApiErrorKind>
{
    fn from(kind: K) -> Self {
        ApiError {
            kind: kind.into(),
            detail: None,
            msg: None
        }
    }
}

impl<K,M> From<(K, M)> for ApiError
where
    K: Into<ApiErrorKind>,
    M: Into<String>,
{
    fn from((kind, msg): (K, M)) -> Self {
        ApiError {
            kind: kind.into(),
            detail: None,
            msg: Some(msg.into())
        }
    }
}

impl<K> From<(K, Detail)> for ApiError
where
    K: Into<ApiErrorKind>
{
    fn from((kind, detail): (K, Detail)) -> Self {
        ApiError {
            kind: kind.into(),
            detail: Some(detail),
            msg: None
        }
    }
}
