use tokio_util::sync::CancellationToken;

use crate::error;
use crate::state::ArcShared;

/// drops every expired grant. lookups evict lazily so this only bounds
/// memory for tokens nobody asks for again
pub async fn sweep(state: ArcShared, _shutdown: CancellationToken) -> error::ApiResult<()> {
    let sec = state.sec();

    let sessions = sec.sessions().purge_expired();
    let challenges = sec.challenges().purge_expired();
    let verifications = sec.verifications().purge_expired();
    let resets = sec.resets().purge_expired();

    tracing::info!(
        sessions,
        challenges,
        verifications,
        resets,
        "purged expired tokens"
    );

    Ok(())
}
