use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;
use tracing::{debug, info};

use super::{HipChatError, MessageRequest, RoomApi, TopicRequest};
use crate::config::{ApiVersion, HipChatConfig};

/// HTTP client for the HipChat rooms API (v1 form API or v2 REST API).
pub struct HipChatClient {
    client: reqwest::Client,
    base: Url,
    token: String,
    version: ApiVersion,
}

impl HipChatClient {
    /// Build the client once from configuration. Proxy and timeout are fixed
    /// for the lifetime of the handle.
    pub fn new(config: &HipChatConfig) -> Result<Self> {
        let base_uri = config.base_uri();
        let base = Url::parse(&base_uri)
            .with_context(|| format!("Invalid HipChat API base: {base_uri}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Invalid HipChat API base: {base_uri}");
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let proxy = config.proxy_uri()?;
        if let Some(ref proxy) = proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy.as_str()).context("Failed to configure HTTP proxy")?,
            );
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        info!(
            "HipChat client configured: base={}, timeout={:?}, proxy={}",
            base,
            config.timeout(),
            proxy
                .as_ref()
                .and_then(|p| p.host_str())
                .unwrap_or("none")
        );

        Ok(Self {
            client,
            base,
            token: config.api_token.clone(),
            version: config.api_version,
        })
    }

    /// `{base}/{segments..}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn check(response: reqwest::Response, room: &str) -> Result<(), HipChatError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(HipChatError::from_status(status, room, body))
    }
}

#[async_trait]
impl RoomApi for HipChatClient {
    async fn send_message(&self, request: &MessageRequest) -> Result<(), HipChatError> {
        let builder = match self.version {
            ApiVersion::V1 => {
                let notify = if request.notify { "1" } else { "0" };
                self.client
                    .post(self.endpoint(&["rooms", "message"]))
                    .query(&[("auth_token", self.token.as_str()), ("format", "json")])
                    .form(&[
                        ("room_id", request.room.as_str()),
                        ("from", request.from.as_str()),
                        ("message", request.message.as_str()),
                        ("notify", notify),
                        ("color", request.color.as_str()),
                        ("message_format", request.format.as_str()),
                    ])
            }
            ApiVersion::V2 => self
                .client
                .post(self.endpoint(&["room", request.room.as_str(), "notification"]))
                .bearer_auth(&self.token)
                .json(&json!({
                    "from": request.from,
                    "message": request.message,
                    "notify": request.notify,
                    "color": request.color,
                    "message_format": request.format,
                })),
        };

        debug!("Sending message to room {}", request.room);
        let response = builder.send().await?;
        Self::check(response, &request.room).await
    }

    async fn set_topic(&self, request: &TopicRequest) -> Result<(), HipChatError> {
        let builder = match self.version {
            ApiVersion::V1 => self
                .client
                .post(self.endpoint(&["rooms", "topic"]))
                .query(&[("auth_token", self.token.as_str()), ("format", "json")])
                .form(&[
                    ("room_id", request.room.as_str()),
                    ("topic", request.topic.as_str()),
                    ("from", request.from.as_str()),
                ]),
            ApiVersion::V2 => self
                .client
                .put(self.endpoint(&["room", request.room.as_str(), "topic"]))
                .bearer_auth(&self.token)
                .json(&json!({ "topic": request.topic })),
        };

        debug!("Setting topic for room {}", request.room);
        let response = builder.send().await?;
        Self::check(response, &request.room).await
    }
}
