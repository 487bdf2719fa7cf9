use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use futures::stream::FuturesUnordered;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config;
use crate::error::{self, Context};
use crate::state::ArcShared;

mod tokens;
mod demo;

// sec  min   hour    day of month   month   day of week   year
// 0    30    9,12,15     1,15       May-Aug  Mon,Wed,Fri  2018/2

async fn job_task<F, T>(
    state: ArcShared,
    shutdown: CancellationToken,
    mut upcoming: cron::OwnedScheduleIterator<Utc>,
    runner: F,
)
where
    T: Future<Output = error::ApiResult<()>>,
    F: Fn(ArcShared, CancellationToken) -> T,
{
    let zero_delta = TimeDelta::zero();

    while let Some(next) = upcoming.next() {
        let delta = next - Utc::now();

        if delta < zero_delta {
            continue;
        }

        let Ok(wait) = delta.to_std() else {
            continue;
        };

        tracing::debug!("waiting for {delta}");

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("job stopped");

                return;
            },
            _ = tokio::time::sleep(wait) => {}
        }

        tracing::debug!("running job");

        if let Err(err) = runner(Arc::clone(&state), shutdown.clone()).await {
            tracing::error!("job failed with error: {err}");
        }
    }

    tracing::info!("job finished");
}

fn spawn_job<F, T>(
    state: &ArcShared,
    shutdown: &CancellationToken,
    name: &'static str,
    crontab: &str,
    runner: F,
) -> error::ApiResult<JoinHandle<()>>
where
    T: Future<Output = error::ApiResult<()>> + Send + 'static,
    F: Fn(ArcShared, CancellationToken) -> T + Send + 'static,
{
    let schedule = cron::Schedule::from_str(crontab)
        .context("failed to parse crontab")?;
    let upcoming = schedule.upcoming_owned(Utc);

    let local_state = Arc::clone(state);
    let local_shutdown = shutdown.clone();

    Ok(tokio::spawn(async move {
        let job_span = tracing::info_span!("job", name = name);

        job_task(local_state, local_shutdown, upcoming, runner)
            .instrument(job_span)
            .await
    }))
}

pub fn background(
    state: &ArcShared,
    shutdown: &CancellationToken,
    jobs: &config::Jobs,
) -> error::ApiResult<FuturesUnordered<JoinHandle<()>>> {
    let waiter = FuturesUnordered::new();

    waiter.push(spawn_job(state, shutdown, "token_sweep", &jobs.token_sweep, tokens::sweep)?);
    waiter.push(spawn_job(state, shutdown, "demo_rotation", &jobs.demo_rotation, demo::rotate)?);

    Ok(waiter)
}
