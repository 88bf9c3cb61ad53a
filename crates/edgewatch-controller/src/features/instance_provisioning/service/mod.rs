use crate::shared::error::{ProvisionError, ProvisionResult};
use crate::shared::types::{DestroyOutcome, OwnedInstance, ProvisionRequest, Region};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use edgewatch_core::ResourceTag;
use edgewatch_providers::{ComputeRepository, LaunchParams, TagFilter};
use std::sync::Arc;
use tracing::{debug, info, warn};

const IMAGE_ID_KEY: &str = "ImageId";
const INSTANCE_TYPE_KEY: &str = "InstanceType";
const KEY_NAME_KEY: &str = "KeyName";

/// Lifecycle operations over the instances carrying the ownership tag.
pub struct InstanceProvisioner {
    repo: Arc<dyn ComputeRepository>,
    regions: Vec<Region>,
    filter: TagFilter,
}

impl InstanceProvisioner {
    /// `regions` bounds every listing and eviction. An empty list means all regions.
    pub fn new(repo: Arc<dyn ComputeRepository>, regions: Vec<Region>) -> Self {
        let regions = if regions.is_empty() {
            Region::ALL.to_vec()
        } else {
            regions
        };

        Self {
            repo,
            regions,
            filter: TagFilter::ownership(),
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Resolve defaults and overrides into provider launch parameters.
    pub fn launch_params(request: &ProvisionRequest) -> LaunchParams {
        let mut extra = request.overrides.clone();
        let image_id = extra
            .remove(IMAGE_ID_KEY)
            .unwrap_or_else(|| request.image_id.clone());
        let instance_type = extra
            .remove(INSTANCE_TYPE_KEY)
            .unwrap_or_else(|| request.instance_type.clone());
        let key_name = extra
            .remove(KEY_NAME_KEY)
            .unwrap_or_else(|| request.key_name.clone());

        LaunchParams {
            image_id,
            instance_type,
            key_name,
            min_count: request.count.get(),
            max_count: request.count.get(),
            user_data: STANDARD.encode(request.bootstrap_script.as_bytes()),
            extra,
        }
    }

    /// Launch instances and tag them as owned.
    ///
    /// Returns the new instance IDs. On a tagging failure the instances
    /// exist but are invisible to `list_running`; their IDs are carried in
    /// [`ProvisionError::Tag`].
    pub async fn create(&self, request: ProvisionRequest) -> ProvisionResult<Vec<String>> {
        let region = request.region;
        let params = Self::launch_params(&request);

        let instance_ids = self
            .repo
            .run_instances(region, &params)
            .await
            .map_err(|source| {
                warn!(%region, error = %source, "Failed to launch instances");
                ProvisionError::Launch { region, source }
            })?;

        if instance_ids.is_empty() {
            return Err(ProvisionError::NothingLaunched(region));
        }
        info!(%region, instance_ids = ?instance_ids, "Created instances");

        self.repo
            .create_tags(region, &instance_ids, &[ResourceTag::ownership()])
            .await
            .map_err(|source| {
                warn!(instance_ids = ?instance_ids, error = %source, "Failed to tag instances");
                ProvisionError::Tag {
                    instance_ids: instance_ids.clone(),
                    source,
                }
            })?;
        info!(instance_ids = ?instance_ids, "Instances tagged successfully");

        Ok(instance_ids)
    }

    /// Owned instances in any state, region by region in configured order.
    pub async fn list_owned(&self) -> ProvisionResult<Vec<OwnedInstance>> {
        let mut owned = Vec::new();
        for &region in &self.regions {
            let instances = self
                .repo
                .describe_instances(region, &self.filter)
                .await
                .map_err(|source| ProvisionError::Describe { region, source })?;
            debug!(%region, count = instances.len(), "Listed owned instances");
            owned.extend(instances);
        }
        Ok(owned)
    }

    pub async fn count(&self) -> ProvisionResult<usize> {
        let count = self.list_owned().await?.len();
        info!(count, "Current instance count");
        Ok(count)
    }

    pub async fn list_running(&self) -> ProvisionResult<Vec<OwnedInstance>> {
        let mut instances = self.list_owned().await?;
        instances.retain(|instance| instance.state.is_running());
        Ok(instances)
    }

    /// Terminate the single running owned instance with the earliest launch time.
    pub async fn destroy_oldest(&self) -> ProvisionResult<DestroyOutcome> {
        let running = self.list_running().await?;

        let Some(target) = oldest(&running) else {
            info!("No instances available for termination");
            return Ok(DestroyOutcome::NoneRunning);
        };

        let instance_id = target.instance_id.clone();
        let region = target.region;

        match self
            .repo
            .terminate_instances(region, std::slice::from_ref(&instance_id))
            .await
        {
            Ok(()) => {
                info!(%instance_id, %region, "Terminated instance");
                Ok(DestroyOutcome::Terminated {
                    instance_id,
                    region,
                })
            }
            Err(error) => {
                warn!(%instance_id, %region, error = %error, "Could not terminate instance");
                Ok(DestroyOutcome::TerminationFailed {
                    instance_id,
                    region,
                    reason: error.to_string(),
                })
            }
        }
    }
}

/// Earliest launch time wins; on ties the first in listing order.
pub fn oldest(instances: &[OwnedInstance]) -> Option<&OwnedInstance> {
    instances.iter().min_by_key(|instance| instance.launch_time)
}
