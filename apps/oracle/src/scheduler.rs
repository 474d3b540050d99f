//! Scheduled mode: one cycle per interval until interrupted.

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use aum_core::CycleRunner;

/// Run cycles back to back on `every`, starting immediately. A failed cycle
/// is logged and the next tick runs as usual. Returns on Ctrl-C.
pub async fn run_scheduled(runner: &CycleRunner, every: Duration) {
    info!("Snapshot scheduler started ({:?} interval)", every);

    let mut ticks = interval(every);
    // An overrunning cycle pushes the next tick back.
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                debug!("Scheduled cycle starting");
                if let Err(e) = runner.run_once().await {
                    warn!("Scheduled cycle failed: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                return;
            }
        }
    }
}
