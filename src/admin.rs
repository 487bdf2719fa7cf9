use acct_api::auth::session::Authenticated;
use acct_api::users::{self as api, CreateUser, SuperAdminCount, UpdateRole};
use acct_lib::sec::authn::password_long_enough;
use acct_lib::sec::authz::permission;
use acct_lib::sec::authz::role::Role;
use acct_lib::user::{email_valid, normalize_email};
use http::Method;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{self, GeneralKind, SecKind, UserKind};
use crate::sandbox;
use crate::sec::authn::{directory_failure, password, session};
use crate::sec::authz::rbac::{count_super_admins, is_root_account, require_admin_permission};
use crate::state::Shared;
use crate::user::{DirectoryError, User};

fn require_root(state: &Shared, caller: &User) -> error::ApiResult<()> {
    if is_root_account(state, caller) {
        Ok(())
    } else {
        Err(error::Error::api(SecKind::RootOnly))
    }
}

/// loads the target of a user operation, the root account is never a
/// valid target
async fn load_target(state: &Shared, cancel: &CancellationToken, user_id: &str) -> error::ApiResult<User> {
    let target = state.users(cancel).get_by_id(user_id).await?;

    if is_root_account(state, &target) {
        return Err(error::Error::api(UserKind::RootProtected));
    }

    Ok(target)
}

/// fails if `target` is the only super admin left while the guard is on
async fn guard_last_super_admin(
    state: &Shared,
    cancel: &CancellationToken,
    target: &User,
) -> error::ApiResult<()> {
    if !state.sec().policy().super_admin_guard || !target.is_super_admin() {
        return Ok(());
    }

    if count_super_admins(state, cancel).await? <= 1 {
        return Err(error::Error::api(UserKind::LastSuperAdmin));
    }

    Ok(())
}

async fn store(state: &Shared, cancel: &CancellationToken, user: User) -> error::ApiResult<User> {
    state.users(cancel)
        .update(user)
        .await
        .map_err(directory_failure(UserKind::UpdateFailed))
}

pub async fn list_users(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
) -> error::ApiResult<Vec<api::User>> {
    require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::USERS_LIST_READ),
        &Method::GET
    ).await?;

    let users = state.users(cancel).list().await?;

    Ok(users.iter()
        .map(User::to_api)
        .collect())
}

pub async fn pause_user(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
    user_id: &str,
) -> error::ApiResult<api::User> {
    let caller = require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::USERS_PAUSE_WRITE),
        &Method::POST
    ).await?;

    let mut target = load_target(state, cancel, user_id).await?;

    if target.id == caller.id {
        return Err(error::Error::api(UserKind::CannotPauseSelf));
    }

    if !target.active {
        return Ok(target.to_api());
    }

    guard_last_super_admin(state, cancel, &target).await?;

    target.active = false;

    let target = store(state, cancel, target).await?;

    tracing::info!(actor = %caller.id, user_id = %target.id, "paused user");

    Ok(target.to_api())
}

pub async fn resume_user(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
    user_id: &str,
) -> error::ApiResult<api::User> {
    let caller = require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::USERS_RESUME_WRITE),
        &Method::POST
    ).await?;

    let mut target = load_target(state, cancel, user_id).await?;

    if target.active {
        return Ok(target.to_api());
    }

    target.active = true;

    let target = store(state, cancel, target).await?;

    tracing::info!(actor = %caller.id, user_id = %target.id, "resumed user");

    Ok(target.to_api())
}

pub async fn renew_proxy_uuid(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
    user_id: &str,
) -> error::ApiResult<api::User> {
    let caller = require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::USERS_RENEW_UUID_WRITE),
        &Method::POST
    ).await?;

    let mut target = load_target(state, cancel, user_id).await?;

    sandbox::assign_proxy_uuid(
        &mut target,
        state.clock().now(),
        state.accounts().rotation_window
    );

    let target = store(state, cancel, target).await?;

    tracing::info!(actor = %caller.id, user_id = %target.id, "renewed proxy uuid");

    Ok(target.to_api())
}

pub async fn update_role(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
    user_id: &str,
    request: UpdateRole,
) -> error::ApiResult<api::User> {
    let caller = require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::USERS_ROLE_WRITE),
        &Method::PUT
    ).await?;

    let raw_role = request.role.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if raw_role.is_none() && request.level.is_none() {
        return Err(error::Error::api(GeneralKind::InvalidRequest)
            .message("role or level is required"));
    }

    let role = Role::normalize(raw_role, request.level);

    if role == Role::Root {
        return Err(error::Error::api(UserKind::RootProtected)
            .message("the root role cannot be assigned"));
    }

    let mut target = load_target(state, cancel, user_id).await?;

    if target.role == role {
        return Ok(target.to_api());
    }

    if !role.is_admin_equivalent() {
        guard_last_super_admin(state, cancel, &target).await?;
    }

    target.role = role;

    let target = store(state, cancel, target).await?;

    tracing::info!(
        actor = %caller.id,
        user_id = %target.id,
        role = role.as_str(),
        "updated role"
    );

    Ok(target.to_api())
}

pub async fn create_custom_user(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
    request: CreateUser,
) -> error::ApiResult<api::User> {
    let caller = require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::USERS_ROLE_WRITE),
        &Method::POST
    ).await?;

    require_root(state, &caller)?;

    let email = normalize_email(&request.email);

    if email.is_empty() {
        return Err(error::Error::api(UserKind::EmailRequired));
    }

    if !email_valid(&email) {
        return Err(error::Error::api(UserKind::InvalidEmail));
    }

    let name = match request.name.trim() {
        "" => email.clone(),
        given => given.to_owned(),
    };

    let proxy_uuid = match request.proxy_uuid.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(given) => match Uuid::parse_str(given) {
            Ok(parsed) => Some(parsed),
            Err(_) => return Err(error::Error::api(UserKind::InvalidUuid)),
        },
    };

    let hash = match request.password.as_deref().map(str::trim) {
        Some("") | None => password::unusable().await?,
        Some(given) => {
            if !password_long_enough(given) {
                return Err(error::Error::api(UserKind::PasswordTooShort));
            }

            password::hash(given.to_owned()).await?
        }
    };

    let mut user = User::new(name, email, hash);
    user.email_verified = true;
    user.proxy_uuid = proxy_uuid;
    user.groups = request.groups.into_iter().collect();

    let user = state.users(cancel)
        .create(user)
        .await
        .map_err(|err| match err {
            DirectoryError::Backend(_) => directory_failure(UserKind::CreationFailed)(err),
            err => err.into(),
        })?;

    tracing::info!(actor = %caller.id, user_id = %user.id, "created custom user");

    Ok(user.to_api())
}

/// lets the root account act as the sandbox account
pub async fn assume_sandbox(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
) -> error::ApiResult<Authenticated> {
    let caller = require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::SETTINGS_WRITE),
        &Method::POST
    ).await?;

    require_root(state, &caller)?;

    let mut sandbox_user = match state.users(cancel).get_by_email(&state.accounts().sandbox_email).await {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => return Err(error::Error::api(UserKind::SandboxMissing)),
        Err(err) => return Err(err.into()),
    };

    sandbox::ensure_rotated(state, cancel, &mut sandbox_user).await?;

    tracing::info!(actor = %caller.id, user_id = %sandbox_user.id, "assumed sandbox");

    session::establish(state, &sandbox_user, "sandbox assumed", None)
}

pub async fn super_admin_count(
    state: &Shared,
    cancel: &CancellationToken,
    session_token: &str,
) -> error::ApiResult<SuperAdminCount> {
    require_admin_permission(
        state,
        cancel,
        session_token,
        Some(permission::SETTINGS_READ),
        &Method::GET
    ).await?;

    Ok(SuperAdminCount {
        count: count_super_admins(state, cancel).await?
    })
}
