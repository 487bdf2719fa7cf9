use acct_api::auth::session::{Authenticated, ChallengeGrant};
use acct_api::auth::totp::{
    MfaDisabled,
    MfaStatus,
    MfaStatusQuery,
    ProvisionTotp,
    TotpProvision,
    VerifyTotp,
};
use acct_lib::ids;
use tokio_util::sync::CancellationToken;

use crate::error::{self, ApiErrorKind, AuthKind, UserKind};
use crate::state::Shared;
use crate::user::{DirectoryError, Mfa, User};

use super::{directory_failure, session, totp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub user_id: ids::UserId,
}

pub fn issue_challenge(state: &Shared, user: &User) -> error::ApiResult<ChallengeGrant> {
    let sec = state.sec();
    let payload = Challenge {
        user_id: user.id.clone()
    };

    let (token, expires_at) = sec.challenges()
        .issue(sec.tokens(), payload, sec.policy().mfa_challenge_ttl)?;

    Ok(ChallengeGrant {
        token,
        expires_at,
    })
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// loads the user a grant points at. a user that has gone away is
/// reported with `missing`
async fn grant_user<K>(
    state: &Shared,
    cancel: &CancellationToken,
    user_id: &str,
    missing: K,
) -> error::ApiResult<User>
where
    K: Into<ApiErrorKind>
{
    match state.users(cancel).get_by_id(user_id).await {
        Ok(user) => Ok(user),
        Err(DirectoryError::NotFound) => Err(error::Error::api(missing)),
        Err(err) => Err(err.into()),
    }
}

/// hands out a new secret for the challenge's user. the challenge is kept
/// alive so the user can finish with `verify`
pub async fn provision(
    state: &Shared,
    cancel: &CancellationToken,
    request: ProvisionTotp,
) -> error::ApiResult<TotpProvision> {
    let sec = state.sec();
    let token = request.token.trim();

    if token.is_empty() {
        return Err(error::Error::api(AuthKind::MfaTokenRequired));
    }

    let Some(grant) = sec.challenges().refresh(token, sec.policy().mfa_challenge_ttl) else {
        return Err(error::Error::api(AuthKind::InvalidMfaToken)
            .message("mfa token is invalid or expired"));
    };

    let mut user = grant_user(state, cancel, &grant.payload.user_id, AuthKind::InvalidMfaToken).await?;

    if user.mfa.enabled {
        return Err(error::Error::api(AuthKind::MfaAlreadyEnabled));
    }

    let issuer = trimmed(&request.issuer)
        .unwrap_or(sec.policy().totp_issuer.as_str())
        .to_owned();
    let account = trimmed(&request.account)
        .unwrap_or(user.totp_account())
        .to_owned();

    let secret = totp::create_secret()?;
    let uri = totp::uri(&secret, &issuer, &account)?;

    user.mfa = Mfa {
        totp_secret: Some(secret.clone()),
        enabled: false,
        secret_issued_at: Some(state.clock().now()),
        confirmed_at: None,
    };

    let user = state.users(cancel)
        .update(user)
        .await
        .map_err(directory_failure(AuthKind::MfaProvisionFailed))?;

    tracing::info!(user_id = %user.id, "provisioned totp secret");

    Ok(TotpProvision {
        secret,
        uri,
        issuer,
        account,
        mfa_token: token.to_owned(),
        user: user.to_api(),
    })
}

/// confirms the provisioned secret with a code, enabling mfa
pub async fn verify(
    state: &Shared,
    cancel: &CancellationToken,
    request: VerifyTotp,
) -> error::ApiResult<Authenticated> {
    let challenges = state.sec().challenges();
    let token = request.token.trim();

    if token.is_empty() {
        return Err(error::Error::api(AuthKind::MfaTokenRequired));
    }

    let Some(grant) = challenges.get(token) else {
        return Err(error::Error::api(AuthKind::InvalidMfaToken)
            .message("mfa token is invalid or expired"));
    };

    let mut user = grant_user(state, cancel, &grant.payload.user_id, AuthKind::InvalidMfaToken).await?;

    let Some(secret) = user.mfa.totp_secret.clone() else {
        return Err(error::Error::api(AuthKind::MfaSecretMissing)
            .message("mfa secret has not been provisioned"));
    };

    let code = request.code.trim();

    if code.is_empty() {
        return Err(error::Error::api(AuthKind::MfaCodeRequired));
    }

    let now = state.clock().now();

    if !totp::verify(&secret, code, now)? {
        return Err(error::Error::api(AuthKind::InvalidMfaCode));
    }

    // a wrong code leaves the challenge in place, a right one spends it
    let Some(grant) = challenges.take(token) else {
        return Err(error::Error::api(AuthKind::InvalidMfaToken)
            .message("mfa token is invalid or expired"));
    };

    user.mfa.enabled = true;
    user.mfa.confirmed_at = Some(now);

    let user = match state.users(cancel).update(user).await {
        Ok(user) => user,
        Err(err) => {
            challenges.restore(token, grant);

            return Err(directory_failure(AuthKind::MfaProvisionFailed)(err));
        }
    };

    tracing::info!(user_id = %user.id, "mfa enabled");

    session::establish(state, &user, "mfa verified", None)
}

/// clears every mfa field and revokes the user's outstanding challenges
pub async fn disable(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
) -> error::ApiResult<MfaDisabled> {
    let (_grant, mut user) = session::lookup(state, cancel, session_token).await?;

    if !user.mfa.is_set() {
        return Err(error::Error::api(AuthKind::MfaNotEnabled));
    }

    user.mfa.clear();

    let user = state.users(cancel)
        .update(user)
        .await
        .map_err(directory_failure(UserKind::UpdateFailed))?;

    let revoked = state.sec()
        .challenges()
        .delete_where(|challenge| challenge.user_id == user.id);

    tracing::info!(user_id = %user.id, revoked, "mfa disabled");

    Ok(MfaDisabled {
        message: "mfa disabled".into(),
        user: user.to_api(),
    })
}

/// resolves the user from a session, then a challenge, then an identifier
pub async fn status(
    state: &Shared,
    cancel: &CancellationToken,
    query: MfaStatusQuery,
) -> error::ApiResult<MfaStatus> {
    let sec = state.sec();
    let session_token = trimmed(&query.session_token);
    let mut mfa_token = trimmed(&query.mfa_token);
    let mut found = None;

    if let Some(token) = session_token {
        if let Some(grant) = sec.sessions().get(token) {
            found = Some(grant_user(state, cancel, &grant.payload.user_id, AuthKind::InvalidSession).await?);
        } else if mfa_token.is_none() {
            // clients sometimes send the challenge in the session slot
            mfa_token = Some(token);
        }
    }

    if found.is_none() {
        if let Some(token) = mfa_token {
            if let Some(grant) = sec.challenges().refresh(token, sec.policy().mfa_challenge_ttl) {
                found = Some(grant_user(state, cancel, &grant.payload.user_id, AuthKind::InvalidMfaToken).await?);
            }
        }
    }

    if found.is_none() {
        if let Some(identifier) = trimmed(&query.identifier) {
            found = Some(state.users(cancel).resolve(identifier).await?);
        }
    }

    let Some(user) = found else {
        return Err(error::Error::api(AuthKind::MfaTokenRequired)
            .message("a valid session or mfa token is required"));
    };

    Ok(MfaStatus {
        mfa: user.mfa.to_api(),
        user: user.to_api(),
    })
}
