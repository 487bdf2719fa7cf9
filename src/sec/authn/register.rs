use acct_api::auth::register::{RegisterUser, Registered, VerifyEmail};
use acct_api::auth::session::Authenticated;
use acct_lib::sec::authn::password_long_enough;
use acct_lib::user::{email_valid, normalize_email};
use tokio_util::sync::CancellationToken;

use crate::error::{self, AuthKind, UserKind};
use crate::state::Shared;
use crate::template::Mail;
use crate::user::User;

use super::{claim_email_grant, directory_failure, mail_grant, password, session};

pub async fn register(
    state: &Shared,
    cancel: &CancellationToken,
    request: RegisterUser,
) -> error::ApiResult<Registered> {
    let name = request.name.trim();
    let email = normalize_email(&request.email);
    let password = request.password.trim();

    if name.is_empty() {
        return Err(error::Error::api(UserKind::NameRequired));
    }

    if email.is_empty() || password.is_empty() {
        return Err(error::Error::api(AuthKind::MissingCredentials)
            .message("email and password are required"));
    }

    if !email_valid(&email) {
        return Err(error::Error::api(UserKind::InvalidEmail));
    }

    if !password_long_enough(password) {
        return Err(error::Error::api(UserKind::PasswordTooShort));
    }

    let verification = state.sec().policy().email_verification;
    let hash = password::hash(password.to_owned()).await?;

    let mut user = User::new(name, email, hash);
    user.email_verified = !verification;

    let user = state.users(cancel).create(user).await?;

    tracing::info!(user_id = %user.id, "registered user");

    let message = if verification {
        let sec = state.sec();

        mail_grant(
            state,
            cancel,
            sec.verifications(),
            sec.policy().verification_ttl,
            Mail::VerifyEmail,
            &user,
            AuthKind::VerificationEmailFailed
        ).await?;

        "verification email sent"
    } else {
        "registration successful"
    };

    Ok(Registered {
        message: message.to_owned(),
        user: user.to_api(),
    })
}

/// consumes a verification token and logs the user in
pub async fn verify_email(
    state: &Shared,
    cancel: &CancellationToken,
    request: VerifyEmail,
) -> error::ApiResult<Authenticated> {
    let token = request.token.trim();

    if token.is_empty() {
        return Err(error::Error::api(AuthKind::InvalidToken)
            .message("verification token is required"));
    }

    let verifications = state.sec().verifications();

    let (grant, mut user) = claim_email_grant(
        state,
        cancel,
        verifications,
        token,
        AuthKind::VerificationFailed
    ).await?;

    if !user.email_verified {
        user.email_verified = true;
        user = match state.users(cancel).update(user).await {
            Ok(user) => user,
            Err(err) => {
                verifications.restore(token, grant);

                return Err(directory_failure(AuthKind::VerificationFailed)(err));
            }
        };
    }

    tracing::info!(user_id = %user.id, "email verified");

    session::establish(state, &user, "email verified", None)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config;
    use crate::testing::{token_from, Harness};

    fn alice() -> RegisterUser {
        RegisterUser {
            name: "Alice".into(),
            email: "a@x.com".into(),
            password: "longenough1".into(),
        }
    }

    #[tokio::test]
    async fn verification_enabled() {
        let harness = Harness::new();

        let registered = register(&harness.state, &harness.cancel, alice()).await.unwrap();

        assert!(!registered.user.email_verified, "user should start unverified");
        assert_eq!(registered.message, "verification email sent");

        let sent = harness.mailer.sent();

        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["a@x.com"]);
        assert_eq!(harness.state.sec().verifications().len(), 1);
    }

    #[tokio::test]
    async fn verification_disabled() {
        let mut settings = config::Settings::default();
        settings.sec.email_verification = false;

        let harness = Harness::with_settings(settings);

        let registered = register(&harness.state, &harness.cancel, alice()).await.unwrap();

        assert!(registered.user.email_verified, "user should start verified");
        assert!(harness.mailer.sent().is_empty(), "no email should be sent");
    }

    #[tokio::test]
    async fn input_validation() {
        let harness = Harness::new();

        let cases = [
            (RegisterUser { name: "  ".into(), ..alice() }, "name_required"),
            (RegisterUser { email: " ".into(), ..alice() }, "missing_credentials"),
            (RegisterUser { password: "   ".into(), ..alice() }, "missing_credentials"),
            (RegisterUser { email: "ax.com".into(), ..alice() }, "invalid_email"),
            (RegisterUser { password: "short".into(), ..alice() }, "password_too_short"),
        ];

        for (request, code) in cases {
            let err = register(&harness.state, &harness.cancel, request).await.unwrap_err();

            assert_eq!(err.code(), code);
        }

        assert!(harness.users().list().await.unwrap().is_empty(), "invalid input created a user");
    }

    #[tokio::test]
    async fn duplicates_leave_original() {
        let harness = Harness::new();

        let original = register(&harness.state, &harness.cancel, alice()).await.unwrap();

        let same_email = register(&harness.state, &harness.cancel, RegisterUser {
            name: "Bob".into(),
            email: " A@X.COM ".into(),
            ..alice()
        }).await.unwrap_err();

        let same_name = register(&harness.state, &harness.cancel, RegisterUser {
            name: "alice".into(),
            email: "b@x.com".into(),
            ..alice()
        }).await.unwrap_err();

        assert_eq!(same_email.code(), "email_already_exists");
        assert_eq!(same_name.code(), "name_already_exists");

        let stored = harness.users().get_by_id(&original.user.id).await.unwrap();

        assert_eq!(stored.to_api(), original.user, "original user changed");
    }

    #[tokio::test]
    async fn failed_send_rolls_back_token() {
        let harness = Harness::new();
        harness.mailer.set_failing(true);

        let err = register(&harness.state, &harness.cancel, alice()).await.unwrap_err();

        assert_eq!(err.code(), "verification_email_failed");
        assert!(harness.state.sec().verifications().is_empty(), "token outlived the failed send");
        assert!(
            harness.users().get_by_email("a@x.com").await.is_ok(),
            "the created user is not rolled back"
        );
    }

    #[tokio::test]
    async fn verify_once() {
        let harness = Harness::new();

        register(&harness.state, &harness.cancel, alice()).await.unwrap();

        let token = token_from(&harness.mailer.sent()[0]);

        let verified = verify_email(&harness.state, &harness.cancel, VerifyEmail {
            token: token.clone()
        }).await.unwrap();

        assert!(verified.user.email_verified);
        assert_eq!(verified.session.token.len(), 64);
        assert!(verified.mfa.is_none());

        let again = verify_email(&harness.state, &harness.cancel, VerifyEmail {
            token
        }).await.unwrap_err();

        assert_eq!(again.code(), "invalid_token");
    }

    #[tokio::test]
    async fn changed_email_invalidates_token() {
        let harness = Harness::new();

        let registered = register(&harness.state, &harness.cancel, alice()).await.unwrap();
        let token = token_from(&harness.mailer.sent()[0]);

        let mut user = harness.users().get_by_id(&registered.user.id).await.unwrap();
        user.email = "new@x.com".into();
        harness.users().update(user).await.unwrap();

        let err = verify_email(&harness.state, &harness.cancel, VerifyEmail {
            token
        }).await.unwrap_err();

        assert_eq!(err.code(), "invalid_token");
        assert!(harness.state.sec().verifications().is_empty(), "stale token was kept");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_verifies_issue_one_session() {
        let harness = Harness::new();

        register(&harness.state, &harness.cancel, alice()).await.unwrap();

        let token = token_from(&harness.mailer.sent()[0]);

        let (first, second) = tokio::join!(
            verify_email(&harness.state, &harness.cancel, VerifyEmail {
                token: token.clone()
            }),
            verify_email(&harness.state, &harness.cancel, VerifyEmail {
                token: token.clone()
            }),
        );

        let loser = match (first, second) {
            (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
            (first, second) => panic!("expected one success: {first:?} {second:?}"),
        };

        assert_eq!(loser.code(), "invalid_token");
        assert_eq!(harness.state.sec().sessions().len(), 1, "both verifies got a session");
    }
}
