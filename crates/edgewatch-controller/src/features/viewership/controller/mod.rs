use crate::features::viewership::service::ViewershipService;
use crate::shared::error::ControllerResult;
use crate::shared::types::PollCycle;
use edgewatch_core::PollSchedule;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

/// Drives the viewership service: resolve, drain, then poll until shutdown.
pub struct ViewershipController {
    service: Arc<ViewershipService>,
    schedule: PollSchedule,
}

impl ViewershipController {
    pub fn new(service: Arc<ViewershipService>, schedule: PollSchedule) -> Self {
        Self { service, schedule }
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    ///
    /// Only channel resolution can fail. A cycle that has started always
    /// completes before the shutdown signal is observed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ControllerResult<()> {
        let user = self.service.resolve_channel().await?;
        self.service.drain().await;

        let mut state = PollCycle::default();
        info!(
            channel = %self.service.settings().channel,
            threshold = self.service.settings().viewer_threshold,
            eviction = %self.service.settings().eviction,
            "Starting viewership polling"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.service.run_cycle(&user).await;
            let delay = self.schedule.next_delay();
            state.advance(&outcome, delay);
            debug!(
                cycle = state.cycle,
                outcome = ?outcome,
                delay_ms = delay.as_millis() as u64,
                "Cycle complete"
            );

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = time::sleep(delay) => {}
            }
        }

        info!(
            cycles = state.cycle,
            last_viewer_count = ?state.last_viewer_count,
            "Viewership polling stopped"
        );
        Ok(())
    }

    pub fn spawn(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<ControllerResult<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
