use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::services::engine::AlertEngine;

/// Background task running `AlertEngine::run_tick` on a fixed interval.
///
/// Ticks run inline in the task, so they never overlap; ticks that come due
/// while one is running are skipped, not queued. Dropping the handle without
/// calling `stop` also ends the loop after the current tick.
pub struct MonitorLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorLoop {
    pub fn start(engine: Arc<AlertEngine>, every: Duration) -> Self {
        let (shutdown, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("[alert-monitor] started, interval {:?}", every);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop_rx.changed() => break,
                }

                let report = engine.run_tick().await;
                if report.persist_failed {
                    tracing::warn!("[alert-monitor] tick finished with unsaved changes");
                } else {
                    tracing::debug!("[alert-monitor] tick: {:?}", report);
                }

                if *stop_rx.borrow() {
                    break;
                }
            }

            tracing::info!("[alert-monitor] stopped");
        });

        Self { shutdown, handle }
    }

    /// Lets an in-flight tick finish, then stops scheduling new ones.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("[alert-monitor] task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
