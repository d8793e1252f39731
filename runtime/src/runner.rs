use crate::runtime::Runtime;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::info;

/// Drive every running node net at a fixed period.
///
/// The loop holds the runtime lock only for the duration of one tick. Ticks
/// that fall behind are skipped rather than replayed. A zero period is
/// raised to one millisecond.
pub fn spawn_runner(runtime: Arc<Mutex<Runtime>>, period: Duration) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(1));
    info!(period_ms = period.as_millis() as u64, "nodenet runner started");
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            runtime.lock().await.tick();
        }
    })
}
