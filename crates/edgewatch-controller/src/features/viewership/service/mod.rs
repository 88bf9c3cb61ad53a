use crate::features::instance_provisioning::service::InstanceProvisioner;
use crate::shared::error::{ControllerError, ControllerResult};
use crate::shared::types::{
    ChannelUser, CycleOutcome, DestroyOutcome, EvictionPolicy, MonitorSettings, ProvisionRequest,
    Region,
};
use edgewatch_core::bootstrap::edge_launch_script;
use edgewatch_providers::StreamRepository;
use std::sync::Arc;
use tracing::{error, info, warn};

/// True when the audience is below target and one more viewer should be added.
pub fn needs_viewer(viewers: u64, threshold: u64) -> bool {
    viewers < threshold
}

/// Decision logic of the monitoring loop, one call per phase.
pub struct ViewershipService {
    streams: Arc<dyn StreamRepository>,
    provisioner: Arc<InstanceProvisioner>,
    settings: MonitorSettings,
}

impl ViewershipService {
    pub fn new(
        streams: Arc<dyn StreamRepository>,
        provisioner: Arc<InstanceProvisioner>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            streams,
            provisioner,
            settings,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Look up the monitored channel. Any failure here ends the run.
    pub async fn resolve_channel(&self) -> ControllerResult<ChannelUser> {
        let channel = &self.settings.channel;
        match self.streams.get_user_by_name(channel).await? {
            Some(user) => {
                info!(%channel, user_id = %user.id, "Resolved channel");
                Ok(user)
            }
            None => Err(ControllerError::ChannelNotFound(channel.clone())),
        }
    }

    /// Retire running owned instances until none remain.
    ///
    /// Stops early on a listing failure or when the same instance fails to
    /// terminate twice in a row. Returns the number actually terminated.
    pub async fn drain(&self) -> usize {
        let mut retired = 0;
        let mut last_failed: Option<String> = None;

        loop {
            match self.provisioner.destroy_oldest().await {
                Ok(DestroyOutcome::NoneRunning) => break,
                Ok(DestroyOutcome::Terminated { .. }) => {
                    retired += 1;
                    last_failed = None;
                }
                Ok(DestroyOutcome::TerminationFailed { instance_id, .. }) => {
                    if last_failed.as_deref() == Some(instance_id.as_str()) {
                        warn!(%instance_id, "Instance keeps rejecting termination, stopping drain");
                        break;
                    }
                    last_failed = Some(instance_id);
                }
                Err(e) => {
                    warn!(error = %e, "Stopping drain early");
                    break;
                }
            }
        }

        info!(retired, "Drained owned instances");
        retired
    }

    /// One poll: fetch the viewer count and provision at most one instance.
    pub async fn run_cycle(&self, user: &ChannelUser) -> CycleOutcome {
        let channel = &self.settings.channel;
        let threshold = self.settings.viewer_threshold;

        let stream = match self.streams.get_live_stream(&user.id).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(%channel, error = %e, "Failed to fetch stream status");
                return CycleOutcome::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };

        let Some(stream) = stream else {
            info!("{channel} is not currently live");
            return CycleOutcome::NotLive;
        };

        let viewers = stream.viewer_count;
        info!(%channel, viewers, threshold, "Current viewer count");

        if !needs_viewer(viewers, threshold) {
            return CycleOutcome::ThresholdMet { viewers };
        }

        self.provision(viewers).await
    }

    async fn provision(&self, viewers: u64) -> CycleOutcome {
        let region = {
            let mut rng = rand::thread_rng();
            Region::choose_from(self.provisioner.regions(), &mut rng).unwrap_or_default()
        };
        let request = ProvisionRequest::single(region, edge_launch_script(&self.settings.channel))
            .with_overrides(self.settings.launch_overrides.clone());

        if self.settings.eviction == EvictionPolicy::RetireOldestBeforeCreate {
            if let Err(e) = self.provisioner.destroy_oldest().await {
                warn!(error = %e, "Could not retire oldest instance");
            }
        }

        match self.provisioner.create(request).await {
            Ok(instance_ids) => CycleOutcome::Provisioned {
                viewers,
                region,
                instance_ids,
            },
            Err(e) => {
                error!(%region, error = %e, "Failed to provision instance");
                CycleOutcome::ProvisionFailed {
                    viewers,
                    region,
                    reason: e.to_string(),
                }
            }
        }
    }
}
