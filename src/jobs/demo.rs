use tokio_util::sync::CancellationToken;

use crate::error::{self, UserKind};
use crate::sandbox;
use crate::sec::authn::directory_failure;
use crate::state::ArcShared;
use crate::user::DirectoryError;

/// hands the demo account a fresh proxy uuid for the next window
pub async fn rotate(state: ArcShared, shutdown: CancellationToken) -> error::ApiResult<()> {
    let accounts = state.accounts();

    let mut user = match state.users(&shutdown).get_by_email(&accounts.demo_email).await {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => {
            tracing::debug!("no demo account to rotate");

            return Ok(());
        },
        Err(err) => return Err(err.into()),
    };

    sandbox::assign_proxy_uuid(&mut user, state.clock().now(), accounts.rotation_window);

    let user = state.users(&shutdown)
        .update(user)
        .await
        .map_err(directory_failure(UserKind::UpdateFailed))?;

    tracing::info!(
        user_id = %user.id,
        expires_at = ?user.proxy_uuid_expires_at,
        "rotated demo identity"
    );

    Ok(())
}
