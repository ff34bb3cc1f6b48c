//! Background sweep that reclaims stale leases

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::pool::ResourcePool;

/// How often the daemon sweeps for expired leases
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Run `ResourcePool::expire_stale` every `interval` until `shutdown` flips
/// to `true` or its sender is dropped.
///
/// The first sweep happens one interval after the call. Each sweep runs in
/// its own task so a panic there is logged and the loop carries on.
pub fn spawn_sweeper(
    pool: Arc<ResourcePool>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_sweep_loop(interval, shutdown, move || {
        let pool = Arc::clone(&pool);
        async move { pool.expire_stale(Utc::now()).await.len() }
    })
}

/// Drive `sweep` on the sweeper's schedule. `sweep` yields the number of
/// leases it reclaimed.
fn spawn_sweep_loop<F, Fut>(
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    sweep: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = usize> + Send + 'static,
{
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "Lease sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match tokio::spawn(sweep()).await {
                        Ok(0) => debug!("Sweep found no stale leases"),
                        Ok(expired) => {
                            info!(expired = expired, "Sweep reclaimed stale leases");
                        }
                        Err(e) => error!(error = %e, "Sweep task failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Lease sweeper stopped");
    })
}
