use acct_api::auth::session::{Authenticated, Login};
use tokio_util::sync::CancellationToken;

use crate::error::{self, AuthKind};
use crate::sandbox;
use crate::state::Shared;
use crate::user::DirectoryError;

use super::{mfa, password, session, totp};

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// password login, or totp only login when the identifier is the account
/// email and mfa is enabled. accounts without mfa get a challenge token
/// alongside the session to start enrolling
pub async fn login(
    state: &Shared,
    cancel: &CancellationToken,
    request: Login,
) -> error::ApiResult<Authenticated> {
    let identifier = request.identifier.trim();
    let password = non_empty(&request.password);
    let totp_code = non_empty(&request.totp_code);

    if identifier.is_empty() {
        return Err(error::Error::api(AuthKind::MissingCredentials)
            .message("identifier is required"));
    }

    let mut user = match state.users(cancel).resolve(identifier).await {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => {
            return Err(error::Error::api(AuthKind::InvalidCredentials));
        },
        Err(err) => return Err(err.into()),
    };

    match password {
        Some(password) => {
            let matched = password::verify(user.password_hash.clone(), password.to_owned()).await?;

            if !matched {
                return Err(error::Error::api(AuthKind::InvalidCredentials));
            }
        },
        None => {
            if totp_code.is_none() {
                return Err(error::Error::api(AuthKind::MissingCredentials)
                    .message("a password or totp code is required"));
            }

            if !user.email_matches(identifier) || !user.mfa.enabled {
                return Err(error::Error::api(AuthKind::PasswordRequired)
                    .message("password required for this identifier"));
            }
        }
    }

    if !user.email.is_empty() && !user.email_verified {
        return Err(error::Error::api(AuthKind::EmailNotVerified)
            .message("email must be verified before login"));
    }

    if user.mfa.enabled {
        let Some(code) = totp_code else {
            return Err(error::Error::api(AuthKind::MfaCodeRequired));
        };

        let Some(secret) = user.mfa.totp_secret.as_deref() else {
            return Err(error::Error::api(AuthKind::MfaSecretMissing));
        };

        if !totp::verify(secret, code, state.clock().now())? {
            return Err(error::Error::api(AuthKind::InvalidMfaCode));
        }

        sandbox::rotate_opportunistic(state, cancel, &mut user).await;

        tracing::info!(user_id = %user.id, "login with mfa");

        return session::establish(state, &user, "login successful", None);
    }

    sandbox::rotate_opportunistic(state, cancel, &mut user).await;

    let challenge = match mfa::issue_challenge(state, &user) {
        Ok(grant) => Some(grant),
        Err(err) => {
            tracing::warn!(user_id = %user.id, "failed to mint mfa challenge during login: {err}");

            None
        }
    };

    tracing::info!(user_id = %user.id, "login");

    session::establish(state, &user, "login successful", challenge)
}

#[cfg(test)]
mod test {
    use acct_lib::sec::authz::role::Role;

    use acct_api::auth::register::{RegisterUser, VerifyEmail};
    use acct_api::auth::totp::{ProvisionTotp, VerifyTotp};

    use super::*;
    use crate::sec::authn::register;
    use crate::testing::{token_from, Harness};

    fn with_password(identifier: &str, password: &str) -> Login {
        Login {
            identifier: identifier.into(),
            password: Some(password.into()),
            totp_code: None,
        }
    }

    #[tokio::test]
    async fn password_login_nudges_mfa() {
        let harness = Harness::new();
        let user = harness.create_user_with_password("alice", "a@x.com", "longenough1").await;

        let by_name = login(&harness.state, &harness.cancel, with_password("ALICE", "longenough1"))
            .await
            .unwrap();
        let by_email = login(&harness.state, &harness.cancel, with_password("a@x.com", "longenough1"))
            .await
            .unwrap();

        assert_eq!(by_name.user.id, user.id);
        assert_eq!(by_email.user.id, user.id);

        let challenge = by_name.mfa.expect("login without mfa should return a challenge");

        assert!(
            harness.state.sec().challenges().get(&challenge.token).is_some(),
            "challenge token was not stored"
        );
        assert!(harness.state.sec().sessions().get(&by_name.session.token).is_some());
    }

    #[tokio::test]
    async fn bad_credentials() {
        let harness = Harness::new();
        harness.create_user_with_password("alice", "a@x.com", "longenough1").await;

        let wrong = login(&harness.state, &harness.cancel, with_password("alice", "longenough2"))
            .await
            .unwrap_err();
        let unknown = login(&harness.state, &harness.cancel, with_password("bob", "longenough1"))
            .await
            .unwrap_err();
        let empty = login(&harness.state, &harness.cancel, with_password(" ", "longenough1"))
            .await
            .unwrap_err();
        let nothing = login(&harness.state, &harness.cancel, Login {
            identifier: "alice".into(),
            password: Some("  ".into()),
            totp_code: None,
        }).await.unwrap_err();

        assert_eq!(wrong.code(), "invalid_credentials");
        assert_eq!(unknown.code(), "invalid_credentials");
        assert_eq!(empty.code(), "missing_credentials");
        assert_eq!(nothing.code(), "missing_credentials");
        assert!(harness.state.sec().sessions().is_empty(), "failed login issued a session");
    }

    #[tokio::test]
    async fn unverified_email_blocks() {
        let harness = Harness::new();
        let mut user = harness.create_user_with_password("alice", "a@x.com", "longenough1").await;
        user.email_verified = false;
        harness.users().update(user).await.unwrap();

        let err = login(&harness.state, &harness.cancel, with_password("alice", "longenough1"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "email_not_verified");
    }

    #[tokio::test]
    async fn passwordless_needs_mfa_and_email() {
        let harness = Harness::new();
        harness.create_user_with_password("alice", "a@x.com", "longenough1").await;

        let err = login(&harness.state, &harness.cancel, Login {
            identifier: "a@x.com".into(),
            password: None,
            totp_code: Some("123456".into()),
        }).await.unwrap_err();

        assert_eq!(err.code(), "password_required");

        let secret = harness.enable_mfa("alice").await;
        let code = harness.code_now(&secret);

        let by_name = login(&harness.state, &harness.cancel, Login {
            identifier: "alice".into(),
            password: None,
            totp_code: Some(code.clone()),
        }).await.unwrap_err();

        assert_eq!(by_name.code(), "password_required");

        let by_email = login(&harness.state, &harness.cancel, Login {
            identifier: "a@x.com".into(),
            password: None,
            totp_code: Some(code),
        }).await.unwrap();

        assert!(by_email.mfa.is_none(), "enrolled users get no challenge");
    }

    #[tokio::test]
    async fn mfa_enabled_requires_code() {
        let harness = Harness::new();
        harness.create_user_with_password("alice", "a@x.com", "longenough1").await;

        let secret = harness.enable_mfa("alice").await;

        let missing = login(&harness.state, &harness.cancel, with_password("alice", "longenough1"))
            .await
            .unwrap_err();

        assert_eq!(missing.code(), "mfa_code_required");

        let mut request = with_password("alice", "longenough1");
        request.totp_code = Some("000000".into());

        if harness.code_now(&secret) != "000000" {
            let wrong = login(&harness.state, &harness.cancel, request.clone()).await.unwrap_err();

            assert_eq!(wrong.code(), "invalid_mfa_code");
        }

        request.totp_code = Some(harness.code_now(&secret));

        let authed = login(&harness.state, &harness.cancel, request).await.unwrap();

        assert!(authed.user.mfa_enabled);
        assert!(authed.mfa.is_none());
    }

    #[tokio::test]
    async fn sandbox_rotates_on_login() {
        let harness = Harness::new();
        let sandbox = harness.create_user_with_password("sandbox", "sandbox@svc.plus", "longenough1").await;

        assert_eq!(sandbox.role, Role::User);

        let authed = login(&harness.state, &harness.cancel, with_password("sandbox", "longenough1"))
            .await
            .unwrap();

        assert!(authed.user.proxy_uuid.is_some(), "sandbox login did not rotate");
    }

    #[tokio::test]
    async fn register_verify_enroll_login() {
        let harness = Harness::new();

        let registered = register::register(&harness.state, &harness.cancel, RegisterUser {
            name: "Alice".into(),
            email: "alice@x.com".into(),
            password: "longenough1".into(),
        }).await.unwrap();

        let unverified = login(&harness.state, &harness.cancel, with_password("alice", "longenough1"))
            .await
            .unwrap_err();

        assert_eq!(unverified.code(), "email_not_verified");

        let token = token_from(&harness.mailer.sent()[0]);

        let verified = register::verify_email(&harness.state, &harness.cancel, VerifyEmail {
            token
        }).await.unwrap();

        assert_eq!(verified.user.id, registered.user.id);
        assert!(verified.user.email_verified);

        let first = login(&harness.state, &harness.cancel, with_password("alice", "longenough1"))
            .await
            .unwrap();
        let challenge = first.mfa.expect("login without mfa should return a challenge");

        let provisioned = mfa::provision(&harness.state, &harness.cancel, ProvisionTotp {
            token: challenge.token.clone(),
            issuer: None,
            account: None,
        }).await.unwrap();

        let enrolled = mfa::verify(&harness.state, &harness.cancel, VerifyTotp {
            token: challenge.token,
            code: harness.code_now(&provisioned.secret),
        }).await.unwrap();

        assert!(enrolled.user.mfa_enabled);

        let no_code = login(&harness.state, &harness.cancel, with_password("alice", "longenough1"))
            .await
            .unwrap_err();

        assert_eq!(no_code.code(), "mfa_code_required");

        let authed = login(&harness.state, &harness.cancel, Login {
            identifier: "alice".into(),
            password: Some("longenough1".into()),
            totp_code: Some(harness.code_now(&provisioned.secret)),
        }).await.unwrap();

        assert_eq!(authed.user.id, registered.user.id);
        assert!(authed.mfa.is_none(), "enrolled user was nudged again");
    }
}
