use acct_lib::sec::authz::permission::operator_default;
use acct_lib::sec::authz::role::Role;
use http::Method;
use tokio_util::sync::CancellationToken;

use crate::error::{self, SecKind};
use crate::sec::authn::session;
use crate::state::Shared;
use crate::user::User;

/// the root role only counts when it sits on the reserved root email
pub fn is_root_account(state: &Shared, user: &User) -> bool {
    user.role == Role::Root || state.accounts().is_root_email(&user.email)
}

/// operator access for a permission. the settings matrix wins over the
/// built in defaults
pub fn operator_allowed(state: &Shared, permission: &str) -> bool {
    state.sec()
        .settings()
        .role_entry(permission, &Role::Operator)
        .unwrap_or_else(|| operator_default(permission))
}

/// decides whether an already loaded user may perform an admin action.
/// checks run in a fixed order so the first failing rule names the error
pub fn authorize(
    state: &Shared,
    user: &User,
    permission: Option<&str>,
    method: &Method,
) -> error::ApiResult<()> {
    let accounts = state.accounts();

    if !user.active {
        return Err(error::Error::api(SecKind::AccountSuspended)
            .message("your account has been suspended"));
    }

    if accounts.is_demo_email(&user.email) && *method != Method::GET {
        return Err(error::Error::api(SecKind::ReadOnlyAccount)
            .message("demo account is read-only"));
    }

    match user.role {
        Role::Root => if accounts.is_root_email(&user.email) {
            Ok(())
        } else {
            Err(error::Error::api(SecKind::RootEmailEnforced)
                .message("root role is restricted to the root account"))
        },
        Role::Admin => Ok(()),
        Role::Operator => match permission {
            Some(permission) if !operator_allowed(state, permission) => {
                Err(error::Error::api(SecKind::Forbidden)
                    .message("operator permission denied"))
            },
            _ => Ok(()),
        },
        Role::User |
        Role::ReadOnly => Err(error::Error::api(SecKind::Forbidden)
            .message("insufficient permissions")),
    }
}

pub async fn require_admin_permission(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
    permission: Option<&str>,
    method: &Method,
) -> error::ApiResult<User> {
    let (_grant, user) = session::lookup(state, cancel, session_token).await?;

    authorize(state, &user, permission, method)?;

    Ok(user)
}

async fn tally_super_admins(state: &Shared, cancel: &CancellationToken) -> error::ApiResult<usize> {
    let users = state.users(cancel).list().await?;

    Ok(users.iter()
        .filter(|user| user.is_super_admin())
        .count())
}

/// only available when the super admin guard is switched on
pub async fn count_super_admins(state: &Shared, cancel: &CancellationToken) -> error::ApiResult<usize> {
    if !state.sec().policy().super_admin_guard {
        return Err(error::Error::api(SecKind::SuperAdminGuardDisabled));
    }

    tally_super_admins(state, cancel).await
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use acct_api::sec::settings::Matrix;
    use acct_lib::sec::authz::permission::{
        SETTINGS_READ,
        SUPER_ADMIN_GROUP,
        USERS_DELETE_WRITE,
        USERS_LIST_READ,
        WILDCARD,
    };

    use super::*;
    use crate::config;
    use crate::testing::Harness;

    async fn check(harness: &Harness, user: &User, permission: Option<&str>, method: Method) -> Result<User, String> {
        let token = harness.session_for(user);

        require_admin_permission(&harness.state, &harness.cancel, &token, permission, &method)
            .await
            .map_err(|err| err.code().to_owned())
    }

    #[tokio::test]
    async fn operator_falls_back_to_defaults() {
        let harness = Harness::new();
        let operator = harness.create_user("op", "op@x.com", Role::Operator).await;

        assert_eq!(
            check(&harness, &operator, Some(USERS_DELETE_WRITE), Method::DELETE).await.unwrap_err(),
            "forbidden"
        );
        assert!(check(&harness, &operator, Some(USERS_LIST_READ), Method::GET).await.is_ok());
        assert!(check(&harness, &operator, None, Method::GET).await.is_ok());
    }

    #[tokio::test]
    async fn matrix_overrides_defaults() {
        let harness = Harness::new();
        let operator = harness.create_user("op", "op@x.com", Role::Operator).await;
        let mut matrix = Matrix::new();

        matrix.insert(USERS_DELETE_WRITE.into(), BTreeMap::from([("operator".into(), true)]));
        matrix.insert(USERS_LIST_READ.into(), BTreeMap::from([("operator".into(), false)]));

        harness.state.sec().settings().put(0, matrix).unwrap();

        assert!(check(&harness, &operator, Some(USERS_DELETE_WRITE), Method::DELETE).await.is_ok());
        assert_eq!(
            check(&harness, &operator, Some(USERS_LIST_READ), Method::GET).await.unwrap_err(),
            "forbidden"
        );
    }

    #[tokio::test]
    async fn roles() {
        let harness = Harness::new();
        let admin = harness.create_user("boss", "boss@x.com", Role::Admin).await;
        let user = harness.create_user("plain", "plain@x.com", Role::User).await;
        let reader = harness.create_user("reader", "reader@x.com", Role::ReadOnly).await;
        let root = harness.create_user("Admin", "admin@svc.plus", Role::Root).await;
        let fake_root = harness.create_user("imposter", "imposter@x.com", Role::Root).await;

        assert!(check(&harness, &admin, Some(USERS_DELETE_WRITE), Method::DELETE).await.is_ok());
        assert!(check(&harness, &root, Some(USERS_DELETE_WRITE), Method::DELETE).await.is_ok());
        assert_eq!(check(&harness, &user, None, Method::GET).await.unwrap_err(), "forbidden");
        assert_eq!(check(&harness, &reader, None, Method::GET).await.unwrap_err(), "forbidden");
        assert_eq!(
            check(&harness, &fake_root, None, Method::GET).await.unwrap_err(),
            "root_email_enforced"
        );
    }

    #[tokio::test]
    async fn check_order() {
        let harness = Harness::new();

        let mut demo = harness.create_user("Demo", "demo@svc.plus", Role::Admin).await;

        assert!(check(&harness, &demo, Some(SETTINGS_READ), Method::GET).await.is_ok());
        assert_eq!(
            check(&harness, &demo, Some(SETTINGS_READ), Method::POST).await.unwrap_err(),
            "read_only_account"
        );

        demo.active = false;
        let demo = harness.users().update(demo).await.unwrap();

        assert_eq!(
            check(&harness, &demo, Some(SETTINGS_READ), Method::POST).await.unwrap_err(),
            "account_suspended",
            "suspension is checked before the read only rule"
        );
    }

    #[tokio::test]
    async fn session_errors() {
        let harness = Harness::new();

        let missing = require_admin_permission(&harness.state, &harness.cancel, "  ", None, &Method::GET)
            .await
            .unwrap_err();
        let unknown = require_admin_permission(&harness.state, &harness.cancel, "abc", None, &Method::GET)
            .await
            .unwrap_err();

        assert_eq!(missing.code(), "session_token_required");
        assert_eq!(unknown.code(), "invalid_session");
    }

    #[tokio::test]
    async fn super_admin_guard() {
        let harness = Harness::new();

        let err = count_super_admins(&harness.state, &harness.cancel).await.unwrap_err();

        assert_eq!(err.code(), "super_admin_guard_disabled");

        let mut settings = config::Settings::default();
        settings.sec.super_admin_guard = true;

        let harness = Harness::with_settings(settings);
        let mut admin = harness.create_user("boss", "boss@x.com", Role::Admin).await;

        assert_eq!(count_super_admins(&harness.state, &harness.cancel).await.unwrap(), 0);

        admin.permissions.insert(WILDCARD.into());
        admin.groups.insert(SUPER_ADMIN_GROUP.into());
        harness.users().update(admin).await.unwrap();

        assert_eq!(count_super_admins(&harness.state, &harness.cancel).await.unwrap(), 1);
    }
}
