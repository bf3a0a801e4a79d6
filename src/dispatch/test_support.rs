use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use super::Record;
use crate::hipchat::{HipChatError, MessageRequest, RoomApi, TopicRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Message(MessageRequest),
    Topic(TopicRequest),
}

/// Records every call; calls aimed at `fail_room` are recorded and then rejected with a 400.
#[derive(Clone, Default)]
pub struct RecordingRoomApi {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_room: Option<String>,
}

impl RecordingRoomApi {
    pub fn failing_for(room: &str) -> Self {
        Self {
            fail_room: Some(room.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, room: &str) -> Result<(), HipChatError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_room.as_deref() == Some(room) {
            return Err(HipChatError::UnknownResponseCode {
                status: 400,
                room: room.to_string(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RoomApi for RecordingRoomApi {
    async fn send_message(&self, request: &MessageRequest) -> Result<(), HipChatError> {
        self.record(Call::Message(request.clone()), &request.room)
    }

    async fn set_topic(&self, request: &TopicRequest) -> Result<(), HipChatError> {
        self.record(Call::Topic(request.clone()), &request.room)
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}
