use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
    V2,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub hipchat: HipChatConfig,
    #[serde(default = "default_dispatch_config")]
    pub dispatch: DispatchConfig,
    #[serde(default = "default_buffer_config")]
    pub buffer: BufferConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HipChatConfig {
    pub api_token: String,
    #[serde(default)]
    pub api_version: ApiVersion,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds, applied to every call made by the client
    #[serde(default)]
    pub default_timeout: Option<u64>,
    #[serde(default)]
    pub http_proxy_host: Option<String>,
    #[serde(default)]
    pub http_proxy_port: Option<u16>,
    #[serde(default)]
    pub http_proxy_user: Option<String>,
    #[serde(default)]
    pub http_proxy_pass: Option<String>,
}

impl HipChatConfig {
    /// Base URL including the API version segment, e.g. `https://api.hipchat.com/v1`
    pub fn base_uri(&self) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), self.api_version)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.default_timeout.map(Duration::from_secs)
    }

    fn proxy_host(&self) -> Option<&str> {
        self.http_proxy_host.as_deref().filter(|h| !h.is_empty())
    }

    /// Combine the proxy settings into a single URI. Only produced when a host is set.
    pub fn proxy_uri(&self) -> Result<Option<Url>> {
        let Some(host) = self.proxy_host() else {
            return Ok(None);
        };
        let port = self.http_proxy_port.with_context(|| {
            format!("http_proxy_port is required when http_proxy_host ({host}) is set")
        })?;

        let mut url = Url::parse(&format!("http://{host}:{port}"))
            .with_context(|| format!("Invalid http proxy: {host}:{port}"))?;

        if let Some(user) = self.http_proxy_user.as_deref() {
            url.set_username(user)
                .map_err(|_| anyhow::anyhow!("Cannot set proxy user for {host}"))?;
            url.set_password(self.http_proxy_pass.as_deref())
                .map_err(|_| anyhow::anyhow!("Cannot set proxy password for {host}"))?;
        }

        Ok(Some(url))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DispatchConfig {
    #[serde(default)]
    pub default_room: Option<String>,
    #[serde(default = "default_from")]
    pub default_from: String,
    #[serde(default)]
    pub default_notify: bool,
    #[serde(default = "default_color")]
    pub default_color: String,
    #[serde(default = "default_format")]
    pub default_format: String,
    /// Record key holding the message body
    #[serde(default = "default_key_name")]
    pub key_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BufferConfig {
    /// Seconds between chunk flushes
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,
    #[serde(default = "default_chunk_limit")]
    pub chunk_limit: usize,
}

fn default_api_base() -> String {
    "https://api.hipchat.com".to_string()
}

fn default_from() -> String {
    "fluentd".to_string()
}

fn default_color() -> String {
    "yellow".to_string()
}

fn default_format() -> String {
    "html".to_string()
}

fn default_key_name() -> String {
    "message".to_string()
}

fn default_flush_interval() -> u64 {
    1
}

fn default_chunk_limit() -> usize {
    256
}

pub(crate) fn default_dispatch_config() -> DispatchConfig {
    DispatchConfig {
        default_room: None,
        default_from: default_from(),
        default_notify: false,
        default_color: default_color(),
        default_format: default_format(),
        key_name: default_key_name(),
    }
}

fn default_buffer_config() -> BufferConfig {
    BufferConfig {
        flush_interval: default_flush_interval(),
        chunk_limit: default_chunk_limit(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.hipchat.api_token.trim().is_empty() {
            anyhow::bail!("hipchat.api_token must not be empty");
        }
        if self.buffer.flush_interval == 0 {
            anyhow::bail!("buffer.flush_interval must be at least 1 second");
        }
        if self.buffer.chunk_limit == 0 {
            anyhow::bail!("buffer.chunk_limit must be at least 1");
        }

        let hipchat = &self.hipchat;
        if hipchat.proxy_host().is_none()
            && (hipchat.http_proxy_port.is_some()
                || hipchat.http_proxy_user.is_some()
                || hipchat.http_proxy_pass.is_some())
        {
            warn!(
                "http_proxy_port/user/pass are set without http_proxy_host; no proxy will be used"
            );
        }
        hipchat.proxy_uri()?;

        Ok(())
    }
}
