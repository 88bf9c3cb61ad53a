pub mod bootstrap;
pub mod schedule;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use thiserror::Error;

pub use schedule::{DelayWindow, PollSchedule};

/// Tag key every owned instance carries.
pub const OWNERSHIP_TAG_KEY: &str = "Name";
/// Tag value every owned instance carries.
pub const OWNERSHIP_TAG_VALUE: &str = "WindowsEdgeInstance";

pub const DEFAULT_IMAGE_ID: &str = "ami-0324a83b82023f0b3";
pub const DEFAULT_INSTANCE_TYPE: &str = "t2.micro";
pub const DEFAULT_KEY_NAME: &str = "RDP";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
    #[error("Invalid delay window: {0}")]
    InvalidDelayWindow(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Regions the controller may launch into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "us-east-1")]
    UsEast1,
    #[serde(rename = "us-west-1")]
    UsWest1,
    #[serde(rename = "eu-west-1")]
    EuWest1,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::UsEast1, Region::UsWest1, Region::EuWest1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::UsEast1 => "us-east-1",
            Region::UsWest1 => "us-west-1",
            Region::EuWest1 => "eu-west-1",
        }
    }

    /// Pick one region uniformly at random. Returns `None` for an empty slice.
    pub fn choose_from<R: Rng + ?Sized>(regions: &[Region], rng: &mut R) -> Option<Region> {
        if regions.is_empty() {
            return None;
        }
        Some(regions[rng.gen_range(0..regions.len())])
    }

    /// Parse a comma separated list such as `us-east-1,eu-west-1`.
    pub fn parse_list(raw: &str) -> Result<Vec<Region>> {
        let mut regions = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let region = name.parse::<Region>()?;
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
        Ok(regions)
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::UsEast1
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Region::ALL
            .into_iter()
            .find(|region| region.as_str() == s)
            .ok_or_else(|| CoreError::UnknownRegion(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Terminated,
    /// Any other provider state, kept verbatim (e.g. `shutting-down`, `stopped`).
    Other(String),
}

impl InstanceState {
    pub fn from_provider_name(name: &str) -> Self {
        match name {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "terminated" => InstanceState::Terminated,
            other => InstanceState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Terminated => "terminated",
            InstanceState::Other(name) => name,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceState::Running)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote instance carrying the ownership tag, as last observed from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedInstance {
    pub instance_id: String,
    pub launch_time: DateTime<Utc>,
    pub state: InstanceState,
    pub region: Region,
}

impl OwnedInstance {
    pub fn new(
        instance_id: impl Into<String>,
        launch_time: DateTime<Utc>,
        state: InstanceState,
        region: Region,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            launch_time,
            state,
            region,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn ownership() -> Self {
        Self::new(OWNERSHIP_TAG_KEY, OWNERSHIP_TAG_VALUE)
    }
}

/// Parameters for one create call.
///
/// `overrides` uses the provider's own launch parameter names. `ImageId`,
/// `InstanceType` and `KeyName` replace the defaulted fields; any other key is
/// forwarded to the provider as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub count: NonZeroU32,
    pub region: Region,
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub bootstrap_script: String,
    pub overrides: BTreeMap<String, String>,
}

impl ProvisionRequest {
    pub fn new(count: NonZeroU32, region: Region, bootstrap_script: impl Into<String>) -> Self {
        Self {
            count,
            region,
            image_id: DEFAULT_IMAGE_ID.to_string(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            key_name: DEFAULT_KEY_NAME.to_string(),
            bootstrap_script: bootstrap_script.into(),
            overrides: BTreeMap::new(),
        }
    }

    /// A request for exactly one instance.
    pub fn single(region: Region, bootstrap_script: impl Into<String>) -> Self {
        Self::new(NonZeroU32::MIN, region, bootstrap_script)
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides.extend(overrides);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_region_round_trip_names() {
        for region in Region::ALL {
            assert_eq!(region.as_str().parse::<Region>().unwrap(), region);
            assert_eq!(region.to_string(), region.as_str());
        }
    }

    #[test]
    fn test_region_rejects_unknown_name() {
        let err = "ap-south-1".parse::<Region>().unwrap_err();
        assert_eq!(err, CoreError::UnknownRegion("ap-south-1".to_string()));
    }

    #[test]
    fn test_region_serde_uses_provider_names() {
        let json = serde_json::to_string(&Region::EuWest1).unwrap();
        assert_eq!(json, "\"eu-west-1\"");
    }

    #[test]
    fn test_region_parse_list_dedups_and_trims() {
        let regions = Region::parse_list(" us-west-1, us-east-1 ,us-west-1,").unwrap();
        assert_eq!(regions, vec![Region::UsWest1, Region::UsEast1]);
    }

    #[test]
    fn test_region_parse_list_fails_on_unknown() {
        assert!(Region::parse_list("us-east-1,mars-1").is_err());
    }

    #[test]
    fn test_choose_from_empty_is_none() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(Region::choose_from(&[], &mut rng).is_none());
    }

    #[test]
    fn test_choose_from_stays_within_set() {
        let mut rng = StdRng::seed_from_u64(42);
        let allowed = [Region::UsWest1, Region::EuWest1];
        for _ in 0..200 {
            let region = Region::choose_from(&allowed, &mut rng).unwrap();
            assert!(allowed.contains(&region));
        }
    }

    #[test]
    fn test_choose_from_reaches_every_region() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            seen.insert(Region::choose_from(&Region::ALL, &mut rng).unwrap());
        }
        assert_eq!(seen.len(), Region::ALL.len());
    }

    #[test]
    fn test_instance_state_from_provider_name() {
        assert_eq!(InstanceState::from_provider_name("running"), InstanceState::Running);
        assert_eq!(InstanceState::from_provider_name("pending"), InstanceState::Pending);
        assert_eq!(
            InstanceState::from_provider_name("terminated"),
            InstanceState::Terminated
        );
        assert_eq!(
            InstanceState::from_provider_name("shutting-down"),
            InstanceState::Other("shutting-down".to_string())
        );
        assert!(!InstanceState::from_provider_name("stopped").is_running());
    }

    #[test]
    fn test_ownership_tag() {
        let tag = ResourceTag::ownership();
        assert_eq!(tag.key, "Name");
        assert_eq!(tag.value, "WindowsEdgeInstance");
    }

    #[test]
    fn test_provision_request_defaults() {
        let request = ProvisionRequest::single(Region::UsWest1, "");
        assert_eq!(request.count.get(), 1);
        assert_eq!(request.image_id, DEFAULT_IMAGE_ID);
        assert_eq!(request.instance_type, DEFAULT_INSTANCE_TYPE);
        assert_eq!(request.key_name, DEFAULT_KEY_NAME);
        assert!(request.overrides.is_empty());
    }

    #[test]
    fn test_provision_request_overrides_accumulate() {
        let mut extra = BTreeMap::new();
        extra.insert("SubnetId".to_string(), "subnet-1".to_string());

        let request = ProvisionRequest::single(Region::UsEast1, "")
            .with_override("InstanceType", "t3.small")
            .with_overrides(extra);

        assert_eq!(request.overrides.len(), 2);
        assert_eq!(request.overrides["InstanceType"], "t3.small");
        assert_eq!(request.overrides["SubnetId"], "subnet-1");
    }
}
