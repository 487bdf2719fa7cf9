use chrono::Duration;
use tokio_util::sync::CancellationToken;

use crate::email::{self, SendError};
use crate::error::{self, ApiErrorKind, AuthKind, GeneralKind};
use crate::state::Shared;
use crate::template::Mail;
use crate::user::{DirectoryError, User};

pub mod token;
pub mod password;
pub mod totp;
pub mod session;
pub mod register;
pub mod login;
pub mod mfa;
pub mod reset;

use token::{EmailBound, Grant, TokenStore};

/// maps a directory failure inside a workflow onto the workflow's own
/// failure code. cancellation stays cancellation
pub(crate) fn directory_failure<K>(kind: K) -> impl FnOnce(DirectoryError) -> error::Error
where
    K: Into<ApiErrorKind>
{
    move |err| match err {
        DirectoryError::Cancelled => error::Error::api(GeneralKind::Cancelled),
        err => error::Error::api(kind).source(err),
    }
}

/// issues an email bound grant and mails it to the user. the grant is
/// removed again if the email cannot be rendered or sent
pub(crate) async fn mail_grant(
    state: &Shared,
    cancel: &CancellationToken,
    store: &TokenStore<EmailBound>,
    ttl: Duration,
    mail: Mail,
    user: &User,
    failed: AuthKind,
) -> error::ApiResult<()> {
    if user.email.is_empty() {
        return Err(error::Error::api(failed)
            .context("user has no email to send to"));
    }

    let payload = EmailBound {
        user_id: user.id.clone(),
        email: user.email.clone(),
    };

    let (token, expires_at) = store.issue(state.sec().tokens(), payload, ttl)
        .map_err(|err| error::Error::api(failed.clone()).source(err))?;

    let message = match state.templates().render_mail(mail, &user.email, &user.name, &token, expires_at) {
        Ok(message) => message,
        Err(err) => {
            store.delete(&token);

            return Err(error::Error::api(failed)
                .context("failed to render email")
                .source(err));
        }
    };

    if let Err(err) = email::dispatch(state.mailer(), cancel, &message).await {
        store.delete(&token);

        tracing::error!(
            store = store.name(),
            user_id = %user.id,
            "failed to send email: {err}"
        );

        let kind: ApiErrorKind = match err {
            SendError::Cancelled => GeneralKind::Cancelled.into(),
            SendError::Failed(_) => failed.into(),
        };

        return Err(error::Error::api(kind).source(err));
    }

    tracing::debug!(
        store = store.name(),
        user_id = %user.id,
        "mailed grant"
    );

    Ok(())
}

/// takes an email bound grant out of the store and resolves it to its
/// user. only one caller can hold a given grant. a grant whose email no
/// longer matches the account, or whose user is gone, stays consumed. a
/// grant that could not be resolved for any other reason is restored
pub(crate) async fn claim_email_grant(
    state: &Shared,
    cancel: &CancellationToken,
    store: &TokenStore<EmailBound>,
    token: &str,
    failed: AuthKind,
) -> error::ApiResult<(Grant<EmailBound>, User)> {
    let Some(grant) = store.take(token) else {
        return Err(error::Error::api(AuthKind::InvalidToken)
            .message("token is invalid or expired"));
    };

    let user = match state.users(cancel).get_by_id(&grant.payload.user_id).await {
        Ok(user) => user,
        Err(err) => {
            if !matches!(err, DirectoryError::NotFound) {
                store.restore(token, grant);
            }

            return Err(directory_failure(failed)(err));
        }
    };

    if !user.email_matches(&grant.payload.email) {
        return Err(error::Error::api(AuthKind::InvalidToken)
            .message("token is invalid or expired"));
    }

    Ok((grant, user))
}
