//! Background task that purges expired records.

use std::{sync::Arc, time::Duration};

use tokio::{
    select,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::TruthStore;

/// Call [`TruthStore::purge_expired`] every `interval` until `shutdown` is
/// cancelled.
///
/// The first purge runs one full interval after spawning. Backend errors are
/// logged and the loop keeps going.
///
/// # Panics
///
/// Panics if `interval` is zero or if called outside a Tokio runtime.
#[must_use = "dropping the handle detaches the purge task"]
pub fn spawn_purger(
    store: Arc<dyn TruthStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                biased;

                () = shutdown.cancelled() => break,
                _ = ticker.tick() => match store.purge_expired() {
                    Ok(0) => {}
                    Ok(purged) => log::debug!("purge task removed {purged} record(s)"),
                    Err(err) => log::warn!("purge task failed: {err}"),
                },
            }
        }
        log::debug!("purge task stopped");
    })
}
