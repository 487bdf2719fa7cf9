use acct_lib::sec::authn::password_long_enough;
use acct_lib::sec::authz::permission::{SUPER_ADMIN_GROUP, WILDCARD};
use acct_lib::sec::authz::role::Role;
use tokio_util::sync::CancellationToken;

use crate::error::{self, UserKind};
use crate::sandbox;
use crate::sec::authn::{directory_failure, password};
use crate::state::Shared;
use crate::user::{DirectoryError, User};

const ROOT_NAME: &str = "Admin";
const DEMO_NAME: &str = "Demo";

/// forces the attributes the root account must always carry. returns
/// true if anything changed
fn repair_root(user: &mut User) -> bool {
    let mut changed = false;

    if user.role != Role::Root {
        user.role = Role::Root;
        changed = true;
    }

    changed |= user.groups.insert(SUPER_ADMIN_GROUP.to_owned());
    changed |= user.permissions.insert(WILDCARD.to_owned());

    if !user.active || !user.email_verified {
        user.active = true;
        user.email_verified = true;
        changed = true;
    }

    changed
}

fn repair_demo(user: &mut User) -> bool {
    let changed = user.role != Role::ReadOnly || !user.active || !user.email_verified;

    user.role = Role::ReadOnly;
    user.active = true;
    user.email_verified = true;

    changed
}

async fn store_repaired(state: &Shared, cancel: &CancellationToken, user: User) -> error::ApiResult<User> {
    state.users(cancel)
        .update(user)
        .await
        .map_err(directory_failure(UserKind::UpdateFailed))
}

/// makes sure the root account exists with its reserved attributes. the
/// password is only needed when the account has to be created
pub async fn ensure_root_user(
    state: &Shared,
    cancel: &CancellationToken,
    password: Option<&str>,
) -> error::ApiResult<User> {
    let root_email = &state.accounts().root_email;

    match state.users(cancel).get_by_email(root_email).await {
        Ok(mut user) => {
            if !repair_root(&mut user) {
                tracing::debug!(user_id = %user.id, "root account in place");

                return Ok(user);
            }

            let user = store_repaired(state, cancel, user).await?;

            tracing::info!(user_id = %user.id, "repaired root account");

            Ok(user)
        },
        Err(DirectoryError::NotFound) => {
            let Some(password) = password.map(str::trim).filter(|v| !v.is_empty()) else {
                return Err(error::Error::new()
                    .context("root account does not exist and no root password was given"));
            };

            if !password_long_enough(password) {
                return Err(error::Error::api(UserKind::PasswordTooShort)
                    .context("root password is too short"));
            }

            let hash = password::hash(password.to_owned()).await?;
            let mut user = User::new(ROOT_NAME, root_email.as_str(), hash);
            repair_root(&mut user);

            let user = state.users(cancel).create(user).await?;

            tracing::info!(user_id = %user.id, "created root account");

            Ok(user)
        },
        Err(err) => Err(err.into()),
    }
}

/// makes sure the read only demo account exists and holds a live proxy
/// uuid
pub async fn ensure_demo_user(state: &Shared, cancel: &CancellationToken) -> error::ApiResult<User> {
    let accounts = state.accounts();
    let now = state.clock().now();

    match state.users(cancel).get_by_email(&accounts.demo_email).await {
        Ok(mut user) => {
            let mut changed = repair_demo(&mut user);

            if sandbox::rotation_due(&user, now) {
                sandbox::assign_proxy_uuid(&mut user, now, accounts.rotation_window);
                changed = true;
            }

            if !changed {
                return Ok(user);
            }

            let user = store_repaired(state, cancel, user).await?;

            tracing::info!(user_id = %user.id, "repaired demo account");

            Ok(user)
        },
        Err(DirectoryError::NotFound) => {
            let hash = password::unusable().await?;
            let mut user = User::new(DEMO_NAME, accounts.demo_email.as_str(), hash);
            repair_demo(&mut user);
            sandbox::assign_proxy_uuid(&mut user, now, accounts.rotation_window);

            let user = state.users(cancel).create(user).await?;

            tracing::info!(user_id = %user.id, "created demo account");

            Ok(user)
        },
        Err(err) => Err(err.into()),
    }
}
