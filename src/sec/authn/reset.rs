use acct_api::auth::password::{ConfirmReset, RequestReset};
use acct_api::auth::session::Authenticated;
use acct_api::Message;
use acct_lib::sec::authn::password_long_enough;
use acct_lib::user::normalize_email;
use tokio_util::sync::CancellationToken;

use crate::error::{self, AuthKind, Context, GeneralKind, UserKind};
use crate::state::Shared;
use crate::template::Mail;
use crate::user::{DirectoryError, User};

use super::{claim_email_grant, directory_failure, mail_grant, password, session};

const RESET_ACK: &str = "if the account exists a reset email will be sent";

/// mails a reset token to a verified account. the reply is the same
/// whether or not the account exists
pub async fn request_reset(
    state: &Shared,
    cancel: &CancellationToken,
    request: RequestReset,
) -> error::ApiResult<Message> {
    let email = normalize_email(&request.email);

    if email.is_empty() {
        return Err(error::Error::api(UserKind::EmailRequired));
    }

    let user = match state.users(cancel).get_by_email(&email).await {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => {
            tracing::debug!("reset requested for unknown email");

            return Ok(Message::new(RESET_ACK));
        },
        Err(err) => return Err(directory_failure(AuthKind::PasswordResetFailed)(err)),
    };

    if user.email.is_empty() || !user.email_verified {
        tracing::debug!(user_id = %user.id, "reset requested for unverified account");

        return Ok(Message::new(RESET_ACK));
    }

    let sec = state.sec();

    mail_grant(
        state,
        cancel,
        sec.resets(),
        sec.policy().reset_ttl,
        Mail::ResetPassword,
        &user,
        AuthKind::PasswordResetFailed,
    ).await?;

    tracing::info!(user_id = %user.id, "password reset requested");

    Ok(Message::new(RESET_ACK))
}

/// sets a new password from a reset token and logs the user in
pub async fn confirm_reset(
    state: &Shared,
    cancel: &CancellationToken,
    request: ConfirmReset,
) -> error::ApiResult<Authenticated> {
    let token = request.token.trim();
    let password = request.password.trim();

    if token.is_empty() || password.is_empty() {
        return Err(error::Error::api(GeneralKind::InvalidRequest)
            .message("token and password are required"));
    }

    if !password_long_enough(password) {
        return Err(error::Error::api(UserKind::PasswordTooShort));
    }

    let resets = state.sec().resets();

    let (grant, user) = claim_email_grant(
        state,
        cancel,
        resets,
        token,
        AuthKind::PasswordResetFailed
    ).await?;

    let user = match apply_reset(state, cancel, user, password).await {
        Ok(user) => user,
        Err(err) => {
            resets.restore(token, grant);

            return Err(err);
        }
    };

    tracing::info!(user_id = %user.id, "password reset");

    session::establish(state, &user, "password reset successful", None)
}

async fn apply_reset(
    state: &Shared,
    cancel: &CancellationToken,
    mut user: User,
    password: &str,
) -> error::ApiResult<User> {
    user.password_hash = password::hash(password.to_owned())
        .await
        .kind(AuthKind::PasswordResetFailed)?;
    user.email_verified = true;

    state.users(cancel)
        .update(user)
        .await
        .map_err(directory_failure(AuthKind::PasswordResetFailed))
}
