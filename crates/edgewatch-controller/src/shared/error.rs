use edgewatch_core::Region;
use edgewatch_providers::{ComputeError, StreamError};
use thiserror::Error;

/// Failures of a single provisioner operation. Never fatal to the poll loop.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Could not create instances in {region}: {source}")]
    Launch {
        region: Region,
        #[source]
        source: ComputeError,
    },
    #[error("Provider launched no instances in {0}")]
    NothingLaunched(Region),
    #[error("Could not tag instances {instance_ids:?}: {source}")]
    Tag {
        instance_ids: Vec<String>,
        #[source]
        source: ComputeError,
    },
    #[error("Could not retrieve instances in {region}: {source}")]
    Describe {
        region: Region,
        #[source]
        source: ComputeError,
    },
}

/// Failures that end a monitoring run.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
    #[error("Stream provider error: {0}")]
    Stream(#[from] StreamError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;
pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
