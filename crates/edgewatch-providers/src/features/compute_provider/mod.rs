pub mod repo;

use edgewatch_core::{ResourceTag, OWNERSHIP_TAG_KEY, OWNERSHIP_TAG_VALUE};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("failed to build compute client: {0}")]
    Client(String),
    #[error("compute request failed: {0}")]
    Transport(String),
    #[error("compute API error {code}: {message}")]
    Api { code: String, message: String },
    #[error("failed to decode compute response: {0}")]
    Decode(String),
    #[error("instance not found: {0}")]
    InstanceNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Provider-ready launch parameters. `user_data` is already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub min_count: u32,
    pub max_count: u32,
    pub user_data: String,
    pub extra: BTreeMap<String, String>,
}

/// Matches instances carrying a tag with exactly this key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn ownership() -> Self {
        Self::new(OWNERSHIP_TAG_KEY, OWNERSHIP_TAG_VALUE)
    }

    pub fn matches(&self, tags: &[ResourceTag]) -> bool {
        tags.iter().any(|tag| tag.key == self.key && tag.value == self.value)
    }
}
