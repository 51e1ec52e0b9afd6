//! Periodic sampling tasks.
//!
//! Each sampler-bearing object instance gets its own tokio task that ticks at
//! a fixed rate and calls [`Sampled::sample`]. The task only holds a weak
//! reference to its instance; once the instance is dropped the task exits on
//! its next tick. Missed ticks are skipped, never replayed.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// An object instance whose values are refreshed on a schedule.
#[async_trait]
pub trait Sampled: Send + Sync {
    /// Name used for the task in logs (e.g. "temperature").
    fn sampler_name(&self) -> &str;

    /// Tick period.
    fn period(&self) -> Duration;

    /// Recompute values and notify on change.
    ///
    /// Failures are handled inside the tick; a tick never ends the task.
    async fn sample(&self);
}

/// Handle to a running sampler task.
pub struct SamplerHandle {
    name: String,
    handle: JoinHandle<()>,
}

impl SamplerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request cancellation without waiting.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task and wait until it has stopped.
    ///
    /// Ticks never await between mutating state and notifying, so an aborted
    /// task cannot leave a half-applied tick or fire afterwards.
    pub async fn cancel(self) {
        self.handle.abort();
        match self.handle.await {
            Ok(()) => debug!(sampler = %self.name, "Sampler already stopped"),
            Err(e) if e.is_cancelled() => debug!(sampler = %self.name, "Sampler cancelled"),
            Err(e) => warn!(sampler = %self.name, error = %e, "Sampler task failed"),
        }
    }
}

/// Spawn the periodic task for an instance.
///
/// The first tick fires one period after spawning.
pub fn spawn_sampler(target: Weak<dyn Sampled>, name: String, period: Duration) -> SamplerHandle {
    let task_name = name.clone();

    let handle = tokio::spawn(async move {
        info!(
            sampler = %task_name,
            period_ms = period.as_millis() as u64,
            "Starting sampler"
        );

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let target = match target.upgrade() {
                Some(t) => t,
                None => {
                    debug!(sampler = %task_name, "Instance dropped, stopping sampler");
                    break;
                }
            };

            target.sample().await;
        }
    });

    SamplerHandle { name, handle }
}

/// Cancel every sampler and wait for all of them.
pub async fn cancel_all(handles: Vec<SamplerHandle>) {
    if handles.is_empty() {
        return;
    }
    info!(sampler_count = handles.len(), "Cancelling samplers");
    join_all(handles.into_iter().map(SamplerHandle::cancel)).await;
}
