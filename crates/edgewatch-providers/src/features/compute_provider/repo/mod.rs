pub mod ec2;
pub mod sigv4;

use crate::features::compute_provider::{ComputeError, LaunchParams, TagFilter};
use async_trait::async_trait;
use chrono::Utc;
use edgewatch_core::{InstanceState, OwnedInstance, Region, ResourceTag};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Instance lifecycle calls against a compute provider.
///
/// Every call names its region explicitly; implementations hold no
/// process-wide region.
#[async_trait]
pub trait ComputeRepository: Send + Sync {
    /// Launch instances and return their IDs.
    async fn run_instances(
        &self,
        region: Region,
        params: &LaunchParams,
    ) -> Result<Vec<String>, ComputeError>;

    /// Attach tags to existing resources.
    async fn create_tags(
        &self,
        region: Region,
        resource_ids: &[String],
        tags: &[ResourceTag],
    ) -> Result<(), ComputeError>;

    /// All instances in `region` matching `filter`, in any state.
    async fn describe_instances(
        &self,
        region: Region,
        filter: &TagFilter,
    ) -> Result<Vec<OwnedInstance>, ComputeError>;

    /// Request termination of the given instances.
    async fn terminate_instances(
        &self,
        region: Region,
        instance_ids: &[String],
    ) -> Result<(), ComputeError>;
}

#[derive(Debug, Clone)]
struct StoredInstance {
    instance: OwnedInstance,
    tags: Vec<ResourceTag>,
    launch: Option<LaunchParams>,
}

/// In-memory compute provider. Launched instances are `Running` immediately.
#[derive(Clone, Default)]
pub struct InMemoryComputeRepository {
    storage: Arc<RwLock<Vec<StoredInstance>>>,
}

impl InMemoryComputeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-existing instance.
    pub fn insert(
        &self,
        instance: OwnedInstance,
        tags: Vec<ResourceTag>,
    ) -> Result<(), ComputeError> {
        let mut storage = self.write()?;
        storage.push(StoredInstance {
            instance,
            tags,
            launch: None,
        });
        Ok(())
    }

    /// Snapshot of every stored instance, in insertion order.
    pub fn instances(&self) -> Result<Vec<OwnedInstance>, ComputeError> {
        let storage = self.read()?;
        Ok(storage.iter().map(|s| s.instance.clone()).collect())
    }

    pub fn tags_of(&self, instance_id: &str) -> Result<Vec<ResourceTag>, ComputeError> {
        let storage = self.read()?;
        storage
            .iter()
            .find(|s| s.instance.instance_id == instance_id)
            .map(|s| s.tags.clone())
            .ok_or_else(|| ComputeError::InstanceNotFound(instance_id.to_string()))
    }

    /// Launch parameters an instance was created with, if it was launched here.
    pub fn launch_params_of(
        &self,
        instance_id: &str,
    ) -> Result<Option<LaunchParams>, ComputeError> {
        let storage = self.read()?;
        storage
            .iter()
            .find(|s| s.instance.instance_id == instance_id)
            .map(|s| s.launch.clone())
            .ok_or_else(|| ComputeError::InstanceNotFound(instance_id.to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<StoredInstance>>, ComputeError> {
        self.storage
            .read()
            .map_err(|_| ComputeError::Storage("Lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<StoredInstance>>, ComputeError> {
        self.storage
            .write()
            .map_err(|_| ComputeError::Storage("Lock poisoned".to_string()))
    }
}

fn generate_instance_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("i-{}", &hex[..17])
}

#[async_trait]
impl ComputeRepository for InMemoryComputeRepository {
    async fn run_instances(
        &self,
        region: Region,
        params: &LaunchParams,
    ) -> Result<Vec<String>, ComputeError> {
        if params.min_count == 0 || params.min_count > params.max_count {
            return Err(ComputeError::Api {
                code: "InvalidParameterValue".to_string(),
                message: format!(
                    "invalid instance count range {}..{}",
                    params.min_count, params.max_count
                ),
            });
        }

        let mut storage = self.write()?;
        let launched_at = Utc::now();
        let mut ids = Vec::with_capacity(params.max_count as usize);

        for _ in 0..params.max_count {
            let instance_id = generate_instance_id();
            storage.push(StoredInstance {
                instance: OwnedInstance::new(
                    instance_id.clone(),
                    launched_at,
                    InstanceState::Running,
                    region,
                ),
                tags: Vec::new(),
                launch: Some(params.clone()),
            });
            ids.push(instance_id);
        }

        Ok(ids)
    }

    async fn create_tags(
        &self,
        region: Region,
        resource_ids: &[String],
        tags: &[ResourceTag],
    ) -> Result<(), ComputeError> {
        let mut storage = self.write()?;

        if let Some(missing) = resource_ids.iter().find(|id| {
            !storage
                .iter()
                .any(|s| &s.instance.instance_id == *id && s.instance.region == region)
        }) {
            return Err(ComputeError::InstanceNotFound(missing.clone()));
        }

        for stored in storage
            .iter_mut()
            .filter(|s| resource_ids.contains(&s.instance.instance_id))
        {
            for tag in tags {
                stored.tags.retain(|existing| existing.key != tag.key);
                stored.tags.push(tag.clone());
            }
        }

        Ok(())
    }

    async fn describe_instances(
        &self,
        region: Region,
        filter: &TagFilter,
    ) -> Result<Vec<OwnedInstance>, ComputeError> {
        let storage = self.read()?;
        Ok(storage
            .iter()
            .filter(|s| s.instance.region == region && filter.matches(&s.tags))
            .map(|s| s.instance.clone())
            .collect())
    }

    async fn terminate_instances(
        &self,
        region: Region,
        instance_ids: &[String],
    ) -> Result<(), ComputeError> {
        let mut storage = self.write()?;

        for instance_id in instance_ids {
            let stored = storage
                .iter_mut()
                .find(|s| &s.instance.instance_id == instance_id && s.instance.region == region)
                .ok_or_else(|| ComputeError::InstanceNotFound(instance_id.clone()))?;
            stored.instance.state = InstanceState::Terminated;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn launch_params(count: u32) -> LaunchParams {
        LaunchParams {
            image_id: "ami-test".to_string(),
            instance_type: "t2.micro".to_string(),
            key_name: "RDP".to_string(),
            min_count: count,
            max_count: count,
            user_data: String::new(),
            extra: BTreeMap::new(),
        }
    }

    fn owned(id: &str, region: Region, state: InstanceState) -> OwnedInstance {
        OwnedInstance::new(
            id,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            state,
            region,
        )
    }

    #[tokio::test]
    async fn test_run_instances_creates_running_untagged() {
        let repo = InMemoryComputeRepository::new();

        let ids = repo
            .run_instances(Region::UsWest1, &launch_params(2))
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.starts_with("i-") && id.len() == 19));
        let instances = repo.instances().unwrap();
        assert!(instances.iter().all(|i| i.state == InstanceState::Running));
        assert!(repo.tags_of(&ids[0]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_instances_rejects_zero_count() {
        let repo = InMemoryComputeRepository::new();
        let result = repo.run_instances(Region::UsEast1, &launch_params(0)).await;
        assert!(matches!(result, Err(ComputeError::Api { .. })));
    }

    #[tokio::test]
    async fn test_describe_filters_by_tag_and_region() {
        let repo = InMemoryComputeRepository::new();
        repo.insert(
            owned("i-owned-east", Region::UsEast1, InstanceState::Running),
            vec![ResourceTag::ownership()],
        )
        .unwrap();
        repo.insert(
            owned("i-owned-west", Region::UsWest1, InstanceState::Running),
            vec![ResourceTag::ownership()],
        )
        .unwrap();
        repo.insert(
            owned("i-foreign", Region::UsEast1, InstanceState::Running),
            vec![ResourceTag::new("Name", "database")],
        )
        .unwrap();

        let found = repo
            .describe_instances(Region::UsEast1, &TagFilter::ownership())
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].instance_id, "i-owned-east");
    }

    #[tokio::test]
    async fn test_create_tags_replaces_same_key() {
        let repo = InMemoryComputeRepository::new();
        repo.insert(
            owned("i-1", Region::UsEast1, InstanceState::Running),
            vec![ResourceTag::new("Name", "old")],
        )
        .unwrap();

        repo.create_tags(
            Region::UsEast1,
            &["i-1".to_string()],
            &[ResourceTag::ownership()],
        )
        .await
        .unwrap();

        assert_eq!(repo.tags_of("i-1").unwrap(), vec![ResourceTag::ownership()]);
    }

    #[tokio::test]
    async fn test_create_tags_unknown_instance() {
        let repo = InMemoryComputeRepository::new();
        let result = repo
            .create_tags(
                Region::UsEast1,
                &["i-missing".to_string()],
                &[ResourceTag::ownership()],
            )
            .await;
        assert_eq!(
            result,
            Err(ComputeError::InstanceNotFound("i-missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_terminate_marks_terminated() {
        let repo = InMemoryComputeRepository::new();
        repo.insert(
            owned("i-1", Region::EuWest1, InstanceState::Running),
            vec![ResourceTag::ownership()],
        )
        .unwrap();

        tokio_test::assert_ok!(
            repo.terminate_instances(Region::EuWest1, &["i-1".to_string()])
                .await
        );

        assert_eq!(repo.instances().unwrap()[0].state, InstanceState::Terminated);
    }

    #[tokio::test]
    async fn test_terminate_wrong_region_is_not_found() {
        let repo = InMemoryComputeRepository::new();
        repo.insert(
            owned("i-1", Region::EuWest1, InstanceState::Running),
            vec![ResourceTag::ownership()],
        )
        .unwrap();

        let result = repo
            .terminate_instances(Region::UsEast1, &["i-1".to_string()])
            .await;
        assert!(matches!(result, Err(ComputeError::InstanceNotFound(_))));
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let repo = InMemoryComputeRepository::new();
        let clone = repo.clone();

        clone
            .run_instances(Region::UsEast1, &launch_params(1))
            .await
            .unwrap();

        assert_eq!(repo.instances().unwrap().len(), 1);
    }
}
