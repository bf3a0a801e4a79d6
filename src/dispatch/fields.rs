use serde_json::Value;
use tracing::warn;

use super::{DispatchError, Record};
use crate::config::DispatchConfig;
use crate::hipchat::{Color, MessageFormat, MessageRequest, TopicRequest};

/// Configuration-level defaults, resolved and validated once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub default_room: Option<String>,
    pub default_from: String,
    pub default_notify: bool,
    pub default_color: Color,
    pub default_format: MessageFormat,
    pub key_name: String,
}

impl DispatchSettings {
    /// Invalid color/format defaults fall back to `yellow` / `html` with a warning.
    pub fn from_config(config: &DispatchConfig) -> Self {
        let default_color = config.default_color.parse().unwrap_or_else(|e| {
            warn!("default_color: {}; using {}", e, Color::default());
            Color::default()
        });
        let default_format = config.default_format.parse().unwrap_or_else(|e| {
            warn!("default_format: {}; using {}", e, MessageFormat::default());
            MessageFormat::default()
        });

        Self {
            default_room: config.default_room.clone().filter(|r| !r.is_empty()),
            default_from: config.default_from.clone(),
            default_notify: config.default_notify,
            default_color,
            default_format,
            key_name: config.key_name.clone(),
        }
    }

    pub fn room(&self, record: &Record) -> Option<String> {
        string_field(record, "room").or_else(|| self.default_room.clone())
    }

    pub fn from(&self, record: &Record) -> String {
        string_field(record, "from").unwrap_or_else(|| self.default_from.clone())
    }

    pub fn notify(&self, record: &Record) -> bool {
        match record.get("notify") {
            None | Some(Value::Null) => self.default_notify,
            Some(value) => truthy(value),
        }
    }

    pub fn color(&self, record: &Record) -> Color {
        record
            .get("color")
            .and_then(Value::as_str)
            .and_then(|c| c.parse().ok())
            .unwrap_or(self.default_color)
    }

    pub fn format(&self, record: &Record) -> MessageFormat {
        record
            .get("format")
            .and_then(Value::as_str)
            .and_then(|f| f.parse().ok())
            .unwrap_or(self.default_format)
    }

    pub fn message(&self, record: &Record) -> Option<String> {
        string_field(record, &self.key_name)
    }

    pub fn topic(&self, record: &Record) -> Option<String> {
        string_field(record, "topic")
    }

    /// `Ok(None)` when the record carries no message body.
    pub fn resolve_message(
        &self,
        record: &Record,
    ) -> Result<Option<MessageRequest>, DispatchError> {
        let Some(message) = self.message(record) else {
            return Ok(None);
        };
        Ok(Some(MessageRequest {
            room: self.room(record).ok_or(DispatchError::MissingRoom)?,
            from: self.from(record),
            message,
            notify: self.notify(record),
            color: self.color(record),
            format: self.format(record),
        }))
    }

    /// `Ok(None)` when the record carries no topic.
    pub fn resolve_topic(
        &self,
        record: &Record,
    ) -> Result<Option<TopicRequest>, DispatchError> {
        let Some(topic) = self.topic(record) else {
            return Ok(None);
        };
        Ok(Some(TopicRequest {
            room: self.room(record).ok_or(DispatchError::MissingRoom)?,
            from: self.from(record),
            topic,
        }))
    }
}

/// Non-empty strings, numbers and `true` count as present. `false`, `null`,
/// empty strings, arrays and objects are absent.
fn string_field(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "yes" | "on" | "1"
        ),
        _ => false,
    }
}
