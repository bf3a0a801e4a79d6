use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use super::{DispatchError, Dispatched, Dispatcher, Record};
use crate::hipchat::RoomApi;

/// A buffered `(tag, time, record)` triple
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub tag: String,
    pub time: i64,
    pub record: Record,
}

#[derive(Debug)]
pub struct RecordOutcome {
    pub tag: String,
    pub time: i64,
    pub result: Result<Dispatched, DispatchError>,
}

#[derive(Debug)]
pub struct ChunkReport {
    pub chunk_id: Uuid,
    pub outcomes: Vec<RecordOutcome>,
}

impl ChunkReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Runs every record of a chunk through the dispatcher, in order.
///
/// A failing record is logged and recorded in the report; it never stops the
/// remaining records. Holds no state between chunks.
pub struct ChunkProcessor<C> {
    dispatcher: Dispatcher<C>,
}

impl<C: RoomApi> ChunkProcessor<C> {
    pub fn new(dispatcher: Dispatcher<C>) -> Self {
        Self { dispatcher }
    }

    pub async fn process(&self, chunk: &[Event]) -> ChunkReport {
        let chunk_id = Uuid::new_v4();
        let span = info_span!("chunk", %chunk_id, records = chunk.len());

        async move {
            let mut outcomes = Vec::with_capacity(chunk.len());
            for event in chunk {
                let result = self.dispatcher.dispatch(&event.record).await;
                if let Err(ref e) = result {
                    error!(
                        tag = %event.tag,
                        time = event.time,
                        error_class = e.kind(),
                        error = %e,
                        "HipChat Error"
                    );
                }
                outcomes.push(RecordOutcome {
                    tag: event.tag.clone(),
                    time: event.time,
                    result,
                });
            }

            let report = ChunkReport { chunk_id, outcomes };
            let (messages, topics) = report
                .outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().ok())
                .fold((0, 0), |(m, t), d| {
                    (m + usize::from(d.message_sent), t + usize::from(d.topic_set))
                });
            debug!(
                "Chunk done: {} messages, {} topics, {} failed",
                messages,
                topics,
                report.failed()
            );
            report
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_dispatch_config, DispatchConfig};
    use crate::dispatch::test_support::{record, Call, RecordingRoomApi};
    use crate::dispatch::DispatchSettings;
    use serde_json::json;
    use tracing_test::traced_test;

    fn event(value: serde_json::Value) -> Event {
        Event {
            tag: "test".to_string(),
            time: 1_700_000_000,
            record: record(value),
        }
    }

    fn processor(api: RecordingRoomApi) -> ChunkProcessor<RecordingRoomApi> {
        ChunkProcessor::new(Dispatcher::new(
            api,
            DispatchSettings::from_config(&DispatchConfig {
                default_room: Some("testroom".to_string()),
                default_from: "testuser".to_string(),
                ..default_dispatch_config()
            }),
        ))
    }

    #[tokio::test]
    async fn test_records_dispatched_in_order() {
        let api = RecordingRoomApi::default();
        let p = processor(api.clone());
        let chunk = vec![
            event(json!({ "message": "one" })),
            event(json!({ "topic": "two" })),
            event(json!({ "message": "three", "room": "other" })),
        ];

        let report = p.process(&chunk).await;
        assert_eq!(report.delivered(), 3);
        assert_eq!(report.failed(), 0);

        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], Call::Message(m) if m.message == "one"));
        assert!(matches!(&calls[1], Call::Topic(t) if t.topic == "two"));
        assert!(matches!(&calls[2], Call::Message(m) if m.room == "other"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_chunk() {
        let api = RecordingRoomApi::failing_for("broken");
        let p = processor(api.clone());
        let chunk = vec![
            event(json!({ "message": "a" })),
            event(json!({ "message": "b", "room": "broken" })),
            event(json!({ "message": "c" })),
            event(json!({ "topic": "d" })),
        ];

        let report = p.process(&chunk).await;
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.delivered(), 3);
        assert_eq!(report.failed(), 1);

        let failure = report.failures().next().unwrap();
        let err = failure.result.as_ref().unwrap_err();
        assert_eq!(err.kind(), "UnknownResponseCode");
        assert_eq!(err.to_string(), "Unexpected 400 for room `broken`");

        // the failing record was attempted, and every other record still went out
        assert_eq!(api.calls().len(), 4);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_logged_once() {
        let api = RecordingRoomApi::failing_for("broken");
        let p = processor(api.clone());
        let chunk = vec![
            event(json!({ "message": "a" })),
            event(json!({ "message": "b", "room": "broken" })),
            event(json!({ "topic": "c" })),
        ];

        let report = p.process(&chunk).await;
        assert_eq!(report.failed(), 1);

        assert!(logs_contain("error=Unexpected 400 for room `broken`"));
        logs_assert(|lines: &[&str]| {
            let errors: Vec<&&str> = lines
                .iter()
                .filter(|line| line.contains("HipChat Error"))
                .collect();
            match errors.as_slice() {
                [line] if line.contains("error_class=UnknownResponseCode") => Ok(()),
                [line] => Err(format!("missing error_class: {line}")),
                other => Err(format!("expected one HipChat Error line, got {}", other.len())),
            }
        });
    }

    #[tokio::test]
    async fn test_missing_room_is_isolated() {
        let api = RecordingRoomApi::default();
        let p = ChunkProcessor::new(Dispatcher::new(
            api.clone(),
            DispatchSettings::from_config(&default_dispatch_config()),
        ));
        let chunk = vec![
            event(json!({ "message": "no room" })),
            event(json!({ "message": "has room", "room": "ops" })),
        ];

        let report = p.process(&chunk).await;
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().next().map(|o| o.time), Some(1_700_000_000));
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_chunk() {
        let api = RecordingRoomApi::default();
        let report = processor(api.clone()).process(&[]).await;
        assert!(report.outcomes.is_empty());
        assert!(api.calls().is_empty());
    }
}
