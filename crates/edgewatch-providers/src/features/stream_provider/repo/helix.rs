//! Twitch Helix adapter.

use crate::features::stream_provider::repo::StreamRepository;
use crate::features::stream_provider::{ChannelUser, LiveStream, StreamError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

#[derive(Clone)]
pub struct HelixCredentials {
    pub client_id: String,
    pub access_token: String,
}

impl HelixCredentials {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for HelixCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelixCredentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

pub struct HelixStreamRepository {
    client: Client,
    credentials: HelixCredentials,
    base_url: String,
}

impl HelixStreamRepository {
    pub fn new(
        credentials: HelixCredentials,
        request_timeout: Duration,
    ) -> Result<Self, StreamError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StreamError::Client(e.to_string()))?;
        Ok(Self {
            client,
            credentials,
            base_url: HELIX_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<HelixPage<T>, StreamError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "Sending Helix request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("Client-Id", &self.credentials.client_id)
            .header(AUTHORIZATION, format!("Bearer {}", self.credentials.access_token))
            .send()
            .await
            .map_err(|e| StreamError::Transport(format!("GET {path}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StreamError::Transport(format!("failed to read {path} response: {e}")))?;

        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        decode_page(&body)
    }
}

#[derive(Debug, Deserialize)]
struct HelixPage<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    viewer_count: u64,
    #[serde(rename = "type", default)]
    kind: String,
}

fn decode_page<T: DeserializeOwned>(body: &str) -> Result<HelixPage<T>, StreamError> {
    serde_json::from_str(body).map_err(|e| StreamError::Decode(e.to_string()))
}

fn first_user(page: HelixPage<HelixUser>) -> Option<ChannelUser> {
    page.data.into_iter().next().map(|user| ChannelUser {
        id: user.id,
        login: user.login,
    })
}

/// Helix omits offline channels from `/streams`; an empty `type` is treated as live.
fn first_live(page: HelixPage<HelixStream>) -> Option<LiveStream> {
    page.data
        .into_iter()
        .find(|stream| stream.kind.is_empty() || stream.kind == "live")
        .map(|stream| LiveStream {
            viewer_count: stream.viewer_count,
        })
}

#[async_trait]
impl StreamRepository for HelixStreamRepository {
    async fn get_user_by_name(&self, login: &str) -> Result<Option<ChannelUser>, StreamError> {
        let page = self.get("users", &[("login", login)]).await?;
        Ok(first_user(page))
    }

    async fn get_live_stream(&self, user_id: &str) -> Result<Option<LiveStream>, StreamError> {
        let page = self.get("streams", &[("user_id", user_id)]).await?;
        Ok(first_live(page))
    }
}
