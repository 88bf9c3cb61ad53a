use crate::shared::error::ConfigError;
use crate::shared::types::{EvictionPolicy, MonitorSettings, Region};
use edgewatch_core::{DelayWindow, PollSchedule};
use edgewatch_providers::{AwsCredentials, HelixCredentials};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_CHANNEL: &str = "KaiCenat";
pub const DEFAULT_VIEWER_THRESHOLD: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which compute adapter the binary wires in.
#[derive(Debug, Clone)]
pub enum ComputeBackend {
    /// In-memory provider; nothing is launched.
    DryRun,
    Ec2(AwsCredentials),
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub channel: String,
    pub viewer_threshold: u64,
    pub eviction: EvictionPolicy,
    pub regions: Vec<Region>,
    pub schedule: PollSchedule,
    pub request_timeout: Duration,
    pub launch_overrides: BTreeMap<String, String>,
    pub twitch: HelixCredentials,
    pub compute: ComputeBackend,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset and empty values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let channel = get("EDGEWATCH_CHANNEL").unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        let viewer_threshold = match get("EDGEWATCH_VIEWER_THRESHOLD") {
            Some(raw) => parse_u64("EDGEWATCH_VIEWER_THRESHOLD", &raw)?,
            None => DEFAULT_VIEWER_THRESHOLD,
        };

        let eviction = match get("EDGEWATCH_EVICTION_POLICY") {
            Some(raw) => raw.parse::<EvictionPolicy>().map_err(|reason| ConfigError::Invalid {
                key: "EDGEWATCH_EVICTION_POLICY",
                reason,
            })?,
            None => EvictionPolicy::default(),
        };

        let regions = match get("EDGEWATCH_REGIONS") {
            Some(raw) => Region::parse_list(&raw).map_err(|e| ConfigError::Invalid {
                key: "EDGEWATCH_REGIONS",
                reason: e.to_string(),
            })?,
            None => Vec::new(),
        };
        let regions = if regions.is_empty() {
            Region::ALL.to_vec()
        } else {
            regions
        };

        let defaults = PollSchedule::default();
        let first = match get("EDGEWATCH_FIRST_DELAY_MS") {
            Some(raw) => parse_window("EDGEWATCH_FIRST_DELAY_MS", &raw)?,
            None => defaults.first,
        };
        let second = match get("EDGEWATCH_SECOND_DELAY_MS") {
            Some(raw) => parse_window("EDGEWATCH_SECOND_DELAY_MS", &raw)?,
            None => defaults.second,
        };

        let request_timeout_secs = match get("EDGEWATCH_REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_u64("EDGEWATCH_REQUEST_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "EDGEWATCH_REQUEST_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let mut launch_overrides = BTreeMap::new();
        for (key, field) in [
            ("EDGEWATCH_IMAGE_ID", "ImageId"),
            ("EDGEWATCH_INSTANCE_TYPE", "InstanceType"),
            ("EDGEWATCH_KEY_NAME", "KeyName"),
        ] {
            if let Some(value) = get(key) {
                launch_overrides.insert(field.to_string(), value);
            }
        }

        let twitch = HelixCredentials::new(
            require("TWITCH_CLIENT_ID")?,
            require("TWITCH_ACCESS_TOKEN")?,
        );

        let dry_run = match get("EDGEWATCH_DRY_RUN") {
            Some(raw) => parse_bool("EDGEWATCH_DRY_RUN", &raw)?,
            None => false,
        };
        let compute = if dry_run {
            ComputeBackend::DryRun
        } else {
            ComputeBackend::Ec2(AwsCredentials::new(
                require("AWS_ACCESS_KEY_ID")?,
                require("AWS_SECRET_ACCESS_KEY")?,
                get("AWS_SESSION_TOKEN"),
            ))
        };

        Ok(Self {
            channel,
            viewer_threshold,
            eviction,
            regions,
            schedule: PollSchedule::new(first, second),
            request_timeout: Duration::from_secs(request_timeout_secs),
            launch_overrides,
            twitch,
            compute,
        })
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings::new(self.channel.clone(), self.viewer_threshold)
            .with_eviction(self.eviction)
            .with_launch_overrides(self.launch_overrides.clone())
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self.compute, ComputeBackend::DryRun)
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{raw}': {e}"),
    })
}

fn parse_window(key: &'static str, raw: &str) -> Result<DelayWindow, ConfigError> {
    DelayWindow::parse_millis(raw).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("'{raw}' is not a boolean"),
        }),
    }
}
