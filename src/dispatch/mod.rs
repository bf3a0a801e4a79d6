pub mod chunk;
pub mod fields;
#[cfg(test)]
pub(crate) mod test_support;

use tracing::debug;

use crate::hipchat::{HipChatError, RoomApi};

pub use chunk::{ChunkProcessor, Event};
pub use fields::DispatchSettings;

/// One inbound event, as decoded from the buffer
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("record has no room and no default_room is configured")]
    MissingRoom,

    #[error(transparent)]
    Remote(#[from] HipChatError),
}

impl DispatchError {
    /// Stable classification used in failure logs
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::MissingRoom => "MissingRoom",
            DispatchError::Remote(e) => e.kind(),
        }
    }
}

/// Which remote calls a record produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatched {
    pub message_sent: bool,
    pub topic_set: bool,
}

/// Turns one record into zero, one or two room calls.
pub struct Dispatcher<C> {
    client: C,
    settings: DispatchSettings,
}

impl<C: RoomApi> Dispatcher<C> {
    pub fn new(client: C, settings: DispatchSettings) -> Self {
        Self { client, settings }
    }

    /// Send the message and/or set the topic. A failed message send stops the
    /// record before its topic update is attempted.
    pub async fn dispatch(&self, record: &Record) -> Result<Dispatched, DispatchError> {
        let mut dispatched = Dispatched::default();

        if let Some(request) = self.settings.resolve_message(record)? {
            debug!(
                "Message to {} from {} (color={}, format={}, notify={})",
                request.room, request.from, request.color, request.format, request.notify
            );
            self.client.send_message(&request).await?;
            dispatched.message_sent = true;
        }

        if let Some(request) = self.settings.resolve_topic(record)? {
            debug!("Topic for {} from {}", request.room, request.from);
            self.client.set_topic(&request).await?;
            dispatched.topic_set = true;
        }

        Ok(dispatched)
    }
}
