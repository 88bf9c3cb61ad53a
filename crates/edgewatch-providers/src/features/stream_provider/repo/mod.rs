pub mod helix;

use crate::features::stream_provider::{ChannelUser, LiveStream, StreamError};
use async_trait::async_trait;

/// Read-only access to a streaming platform's user and stream metadata.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait StreamRepository: Send + Sync {
    /// Look a user up by login name. `None` if no such user exists.
    async fn get_user_by_name(&self, login: &str) -> Result<Option<ChannelUser>, StreamError>;

    /// The user's current broadcast. `None` if the channel is not live.
    async fn get_live_stream(&self, user_id: &str) -> Result<Option<LiveStream>, StreamError>;
}
