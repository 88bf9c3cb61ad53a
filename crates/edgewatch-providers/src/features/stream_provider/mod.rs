pub mod repo;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("failed to build stream client: {0}")]
    Client(String),
    #[error("stream request failed: {0}")]
    Transport(String),
    #[error("stream API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode stream response: {0}")]
    Decode(String),
}

/// Resolved identity of a channel owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUser {
    pub id: String,
    pub login: String,
}

/// Metrics of a broadcast that is currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStream {
    pub viewer_count: u64,
}
