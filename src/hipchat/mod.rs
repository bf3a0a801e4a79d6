pub mod client;

use async_trait::async_trait;
use serde::Serialize;
use std::str::FromStr;

pub use client::HipChatClient;

/// Message colors accepted by the rooms API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Yellow,
    Red,
    Green,
    Purple,
    Gray,
    Random,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Yellow => "yellow",
            Color::Red => "red",
            Color::Green => "green",
            Color::Purple => "purple",
            Color::Gray => "gray",
            Color::Random => "random",
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yellow" => Ok(Color::Yellow),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "purple" => Ok(Color::Purple),
            "gray" => Ok(Color::Gray),
            "random" => Ok(Color::Random),
            other => Err(format!("unknown color: {other}")),
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    #[default]
    Html,
    Text,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Html => "html",
            MessageFormat::Text => "text",
        }
    }
}

impl FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(MessageFormat::Html),
            "text" => Ok(MessageFormat::Text),
            other => Err(format!("unknown message format: {other}")),
        }
    }
}

impl std::fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved room notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRequest {
    pub room: String,
    pub from: String,
    pub message: String,
    pub notify: bool,
    pub color: Color,
    pub format: MessageFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRequest {
    pub room: String,
    pub from: String,
    pub topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HipChatError {
    #[error("Access denied to room `{room}`")]
    Unauthorized { room: String },

    #[error("Unknown room: `{room}`")]
    UnknownRoom { room: String },

    #[error("Rate limit exceeded for room `{room}`")]
    RateLimited { room: String },

    #[error("Unexpected {status} for room `{room}`")]
    UnknownResponseCode {
        status: u16,
        room: String,
        body: String,
    },

    #[error("HipChat request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl HipChatError {
    pub fn from_status(status: reqwest::StatusCode, room: &str, body: String) -> Self {
        let room = room.to_string();
        match status.as_u16() {
            401 => HipChatError::Unauthorized { room },
            404 => HipChatError::UnknownRoom { room },
            429 => HipChatError::RateLimited { room },
            code => HipChatError::UnknownResponseCode {
                status: code,
                room,
                body,
            },
        }
    }

    /// Stable classification used in failure logs
    pub fn kind(&self) -> &'static str {
        match self {
            HipChatError::Unauthorized { .. } => "Unauthorized",
            HipChatError::UnknownRoom { .. } => "UnknownRoom",
            HipChatError::RateLimited { .. } => "RateLimited",
            HipChatError::UnknownResponseCode { .. } => "UnknownResponseCode",
            HipChatError::Transport(_) => "Transport",
        }
    }
}

/// The two room operations the dispatcher needs from the messaging service.
///
/// Implementations are configured once (credentials, proxy, timeout) and then
/// shared read-only; calls are awaited one at a time by the dispatcher.
#[async_trait]
pub trait RoomApi: Send + Sync {
    async fn send_message(&self, request: &MessageRequest) -> Result<(), HipChatError>;

    async fn set_topic(&self, request: &TopicRequest) -> Result<(), HipChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse() {
        assert_eq!("red".parse::<Color>(), Ok(Color::Red));
        assert_eq!("random".parse::<Color>(), Ok(Color::Random));
        assert!("invalid".parse::<Color>().is_err());
        assert!("Red".parse::<Color>().is_err());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("text".parse::<MessageFormat>(), Ok(MessageFormat::Text));
        assert!("markdown".parse::<MessageFormat>().is_err());
    }

    #[test]
    fn test_status_classification() {
        let err =
            HipChatError::from_status(reqwest::StatusCode::BAD_REQUEST, "testroom", String::new());
        assert_eq!(err.kind(), "UnknownResponseCode");
        assert_eq!(err.to_string(), "Unexpected 400 for room `testroom`");

        let err = HipChatError::from_status(reqwest::StatusCode::NOT_FOUND, "ops", String::new());
        assert_eq!(err.kind(), "UnknownRoom");

        let err =
            HipChatError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "ops", String::new());
        assert_eq!(err.kind(), "RateLimited");

        let err =
            HipChatError::from_status(reqwest::StatusCode::UNAUTHORIZED, "ops", String::new());
        assert_eq!(err.kind(), "Unauthorized");
    }
}
