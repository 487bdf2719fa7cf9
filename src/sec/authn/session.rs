use acct_api::auth::session::{Authenticated, ChallengeGrant, CurrentSession, SessionGrant};
use acct_api::Message;
use acct_lib::ids;
use tokio_util::sync::CancellationToken;

use crate::error::{self, AuthKind, Context};
use crate::sandbox;
use crate::state::Shared;
use crate::user::{DirectoryError, User};

use super::token::Grant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: ids::UserId,
}

pub fn issue(state: &Shared, user: &User) -> error::ApiResult<SessionGrant> {
    let sec = state.sec();
    let payload = SessionData {
        user_id: user.id.clone()
    };

    let (token, expires_at) = sec.sessions()
        .issue(sec.tokens(), payload, sec.policy().session_ttl)
        .kind(AuthKind::SessionCreationFailed)?;

    tracing::debug!(user_id = %user.id, "issued session");

    Ok(SessionGrant {
        token,
        expires_at
    })
}

/// issues a session and packages it with the user for the caller
pub fn establish(
    state: &Shared,
    user: &User,
    message: &str,
    mfa: Option<ChallengeGrant>,
) -> error::ApiResult<Authenticated> {
    let session = issue(state, user)?;

    Ok(Authenticated {
        message: message.to_owned(),
        session,
        user: user.to_api(),
        mfa,
    })
}

/// resolves a session to its user. a sandbox user whose identity is due
/// comes back already rotated
pub async fn lookup(
    state: &Shared,
    cancel: &CancellationToken,
    token: &str,
) -> error::ApiResult<(Grant<SessionData>, User)> {
    let token = token.trim();

    if token.is_empty() {
        return Err(error::Error::api(AuthKind::SessionTokenRequired));
    }

    let sessions = state.sec().sessions();

    let Some(grant) = sessions.get(token) else {
        return Err(error::Error::api(AuthKind::InvalidSession)
            .message("session token is invalid or expired"));
    };

    match state.users(cancel).get_by_id(&grant.payload.user_id).await {
        Ok(mut user) => {
            sandbox::rotate_opportunistic(state, cancel, &mut user).await;

            Ok((grant, user))
        },
        Err(DirectoryError::NotFound) => {
            sessions.delete(token);

            Err(error::Error::api(AuthKind::InvalidSession)
                .context("session user no longer exists"))
        },
        Err(err) => Err(err.into()),
    }
}

pub async fn current(
    state: &Shared,
    cancel: &CancellationToken,
    token: &str,
) -> error::ApiResult<CurrentSession> {
    let (grant, user) = lookup(state, cancel, token).await?;

    Ok(CurrentSession {
        expires_at: grant.expires_at,
        user: user.to_api(),
    })
}

/// logging out of an unknown session is not an error
pub fn delete(state: &Shared, token: &str) -> error::ApiResult<Message> {
    if token.trim().is_empty() {
        return Err(error::Error::api(AuthKind::SessionTokenRequired));
    }

    if state.sec().sessions().delete(token).is_some() {
        tracing::debug!("session deleted");
    }

    Ok(Message::new("session deleted"))
}
