use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{FmtSubscriber, EnvFilter};

use acct::{bootstrap, config, error, jobs, state};

fn main() {
    use tokio::runtime::Builder;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("acct=info"));

    if let Err(err) = FmtSubscriber::builder()
        .with_env_filter(filter)
        .try_init() {
        eprintln!("failed to initialize global tracing subscriber: {err}");
        return;
    }

    let rt = match Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .max_blocking_threads(4)
        .build() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!("failed to start tokio runtime. {err}");
            return;
        }
    };

    tracing::event!(
        tracing::Level::INFO,
        "started tokio runtime"
    );

    if let Err(err) = rt.block_on(init()) {
        tracing::error!("{err}");
    }
}

async fn init() -> error::ApiResult<()> {
    let config = config::get_config()
        .map_err(|err| error::Error::new()
            .context("failed to load config")
            .source(err))?;
    let state = Arc::new(state::Shared::from_config(&config)?);
    let shutdown = CancellationToken::new();

    let root = bootstrap::ensure_root_user(&state, &shutdown, config.root_password.as_deref()).await?;
    let demo = bootstrap::ensure_demo_user(&state, &shutdown).await?;

    tracing::info!(root = %root.id, demo = %demo.id, "reserved accounts ready");

    let mut all_futs = jobs::background(&state, &shutdown, &config.settings.jobs)?;

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }

    tracing::info!("shutting down");

    shutdown.cancel();

    while let Some(result) = all_futs.next().await {
        if let Err(err) = result {
            tracing::error!("job task failed to join: {err}");
        }
    }

    Ok(())
}
