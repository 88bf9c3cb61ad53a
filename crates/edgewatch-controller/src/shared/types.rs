pub use edgewatch_core::{InstanceState, OwnedInstance, ProvisionRequest, Region};
pub use edgewatch_providers::{ChannelUser, LiveStream};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Result of one `destroy_oldest` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// No owned instance was running; nothing was sent.
    NoneRunning,
    Terminated {
        instance_id: String,
        region: Region,
    },
    /// A termination was sent and the provider rejected it.
    TerminationFailed {
        instance_id: String,
        region: Region,
        reason: String,
    },
}

impl DestroyOutcome {
    /// Whether a termination request was sent, regardless of its result.
    pub fn issued(&self) -> bool {
        !matches!(self, DestroyOutcome::NoneRunning)
    }

    pub fn instance_id(&self) -> Option<&str> {
        match self {
            DestroyOutcome::NoneRunning => None,
            DestroyOutcome::Terminated { instance_id, .. }
            | DestroyOutcome::TerminationFailed { instance_id, .. } => Some(instance_id.as_str()),
        }
    }
}

/// What a single poll cycle decided and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NotLive,
    ThresholdMet {
        viewers: u64,
    },
    Provisioned {
        viewers: u64,
        region: Region,
        instance_ids: Vec<String>,
    },
    ProvisionFailed {
        viewers: u64,
        region: Region,
        reason: String,
    },
    FetchFailed {
        reason: String,
    },
}

impl CycleOutcome {
    pub fn viewer_count(&self) -> Option<u64> {
        match self {
            CycleOutcome::ThresholdMet { viewers }
            | CycleOutcome::Provisioned { viewers, .. }
            | CycleOutcome::ProvisionFailed { viewers, .. } => Some(*viewers),
            CycleOutcome::NotLive | CycleOutcome::FetchFailed { .. } => None,
        }
    }
}

/// Poll loop bookkeeping. Lives only as long as the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCycle {
    pub cycle: u64,
    pub last_viewer_count: Option<u64>,
    pub next_delay: Duration,
}

impl PollCycle {
    pub fn advance(&mut self, outcome: &CycleOutcome, next_delay: Duration) {
        self.cycle += 1;
        if let Some(viewers) = outcome.viewer_count() {
            self.last_viewer_count = Some(viewers);
        }
        self.next_delay = next_delay;
    }
}

/// How instances created during steady-state polling are retired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Only the startup drain terminates instances. Owned instances can
    /// accumulate across below-threshold cycles.
    #[default]
    DrainOnly,
    /// Every create is preceded by one `destroy_oldest`.
    ///
    /// Only running instances are retired, so a launch still pending from an
    /// earlier cycle survives and the pool can exceed one instance.
    RetireOldestBeforeCreate,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::DrainOnly => "drain-only",
            EvictionPolicy::RetireOldestBeforeCreate => "retire-oldest-before-create",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "drain-only" => Ok(EvictionPolicy::DrainOnly),
            "retire-oldest-before-create" => Ok(EvictionPolicy::RetireOldestBeforeCreate),
            other => Err(format!(
                "unknown eviction policy '{other}' (expected drain-only or retire-oldest-before-create)"
            )),
        }
    }
}

/// Fixed settings of one monitoring run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub channel: String,
    pub viewer_threshold: u64,
    pub eviction: EvictionPolicy,
    pub launch_overrides: BTreeMap<String, String>,
}

impl MonitorSettings {
    pub fn new(channel: impl Into<String>, viewer_threshold: u64) -> Self {
        Self {
            channel: channel.into(),
            viewer_threshold,
            eviction: EvictionPolicy::default(),
            launch_overrides: BTreeMap::new(),
        }
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_launch_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.launch_overrides = overrides;
        self
    }
}
