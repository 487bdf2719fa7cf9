use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{self, UserKind};
use crate::sec::authn::directory_failure;
use crate::state::Shared;
use crate::user::User;

/// a missing uuid, a missing expiry or a passed expiry all make the
/// identity due
pub fn rotation_due(user: &User, now: DateTime<Utc>) -> bool {
    match (user.proxy_uuid, user.proxy_uuid_expires_at) {
        (Some(_), Some(expires_at)) => now >= expires_at,
        _ => true,
    }
}

pub fn assign_proxy_uuid(user: &mut User, now: DateTime<Utc>, window: Duration) {
    user.proxy_uuid = Some(Uuid::new_v4());
    user.proxy_uuid_expires_at = Some(now + window);
}

/// rotates the proxy uuid of the sandbox account when it is due. any other
/// account is left alone. returns true if a rotation was stored.
///
/// concurrent callers each write their own rotation and the last write
/// wins, `user` always holds what this call stored
pub async fn ensure_rotated(
    state: &Shared,
    cancel: &CancellationToken,
    user: &mut User,
) -> error::ApiResult<bool> {
    let accounts = state.accounts();

    if !accounts.is_sandbox_email(&user.email) {
        return Ok(false);
    }

    let now = state.clock().now();

    if !rotation_due(user, now) {
        return Ok(false);
    }

    let mut rotated = user.clone();
    assign_proxy_uuid(&mut rotated, now, accounts.rotation_window);

    *user = state.users(cancel)
        .update(rotated)
        .await
        .map_err(directory_failure(UserKind::UpdateFailed))?;

    tracing::info!(
        user_id = %user.id,
        expires_at = ?user.proxy_uuid_expires_at,
        "rotated sandbox identity"
    );

    Ok(true)
}

/// for read paths that should not fail because of a rotation
pub async fn rotate_opportunistic(state: &Shared, cancel: &CancellationToken, user: &mut User) {
    if let Err(err) = ensure_rotated(state, cancel, user).await {
        tracing::warn!(user_id = %user.id, "sandbox rotation failed: {err}");
    }
}

#[cfg(test)]
mod test {
    use acct_lib::sec::authz::role::Role;

    use super::*;
    use crate::testing::Harness;
    use crate::time::Clock;

    #[tokio::test]
    async fn rotates_once_per_window() {
        let harness = Harness::new();
        let mut sandbox = harness.create_user("sandbox", "sandbox@svc.plus", Role::User).await;

        assert!(ensure_rotated(&harness.state, &harness.cancel, &mut sandbox).await.unwrap());

        let first = sandbox.proxy_uuid.expect("uuid was not assigned");
        let rotated_at = harness.clock.now();

        assert_eq!(sandbox.proxy_uuid_expires_at, Some(rotated_at + Duration::hours(1)));

        harness.clock.advance(Duration::minutes(30));

        assert!(!ensure_rotated(&harness.state, &harness.cancel, &mut sandbox).await.unwrap());
        assert_eq!(sandbox.proxy_uuid, Some(first), "rotated inside the window");

        harness.clock.advance(Duration::minutes(30));
        let boundary = harness.clock.now();

        assert!(ensure_rotated(&harness.state, &harness.cancel, &mut sandbox).await.unwrap());
        assert_ne!(sandbox.proxy_uuid, Some(first), "expired identity kept its uuid");
        assert_eq!(sandbox.proxy_uuid_expires_at, Some(boundary + Duration::hours(1)));

        let stored = harness.users().get_by_id(&sandbox.id).await.unwrap();

        assert_eq!(stored.proxy_uuid, sandbox.proxy_uuid, "rotation was not persisted");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_rotations_settle_on_one() {
        let harness = Harness::new();
        let sandbox = harness.create_user("sandbox", "sandbox@svc.plus", Role::User).await;
        let mut first = sandbox.clone();
        let mut second = sandbox.clone();

        let (first_result, second_result) = tokio::join!(
            ensure_rotated(&harness.state, &harness.cancel, &mut first),
            ensure_rotated(&harness.state, &harness.cancel, &mut second),
        );

        assert!(first_result.unwrap());
        assert!(second_result.unwrap());

        let stored = harness.users().get_by_id(&sandbox.id).await.unwrap();
        let expires_at = Some(harness.clock.now() + Duration::hours(1));

        assert!(
            stored.proxy_uuid == first.proxy_uuid || stored.proxy_uuid == second.proxy_uuid,
            "stored uuid came from neither rotation"
        );
        assert_eq!(stored.proxy_uuid_expires_at, expires_at);
        assert_eq!(first.proxy_uuid_expires_at, expires_at);
        assert_eq!(second.proxy_uuid_expires_at, expires_at);

        let mut later = stored.clone();

        assert!(!ensure_rotated(&harness.state, &harness.cancel, &mut later).await.unwrap());
        assert_eq!(later.proxy_uuid, stored.proxy_uuid, "settled identity rotated again");
    }

    #[tokio::test]
    async fn other_accounts_untouched() {
        let harness = Harness::new();
        let mut user = harness.create_user("alice", "a@x.com", Role::User).await;

        assert!(!ensure_rotated(&harness.state, &harness.cancel, &mut user).await.unwrap());
        assert!(user.proxy_uuid.is_none());
    }

    #[test]
    fn due_rules() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut user = User::new("sandbox", "sandbox@svc.plus", String::new());

        assert!(rotation_due(&user, now), "no uuid");

        user.proxy_uuid = Some(Uuid::new_v4());

        assert!(rotation_due(&user, now), "no expiry");

        user.proxy_uuid_expires_at = Some(now);

        assert!(rotation_due(&user, now), "expiry reached");

        user.proxy_uuid_expires_at = Some(now + Duration::seconds(1));

        assert!(!rotation_due(&user, now), "still valid");
    }
}
