use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use crate::buffer::Buffer;
use crate::dispatch::{Event, Record};

const DEFAULT_TAG: &str = "hipchat";

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    time: Option<i64>,
    record: Record,
}

/// Parse one NDJSON line. Either `{"tag", "time", "record": {..}}` or a bare record object.
/// Blank lines yield `None`.
pub fn parse_line(line: &str, now: i64) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line).context("Invalid JSON")?;
    let Value::Object(map) = value else {
        anyhow::bail!("Expected a JSON object");
    };

    if map.get("record").is_some_and(Value::is_object) {
        let envelope: Envelope = serde_json::from_value(Value::Object(map))
            .context("Invalid event envelope")?;
        return Ok(Some(Event {
            tag: envelope.tag.unwrap_or_else(|| DEFAULT_TAG.to_string()),
            time: envelope.time.unwrap_or(now),
            record: envelope.record,
        }));
    }

    Ok(Some(Event {
        tag: DEFAULT_TAG.to_string(),
        time: now,
        record: map,
    }))
}

/// Read events until EOF, pushing each into the buffer. Returns the number accepted.
pub async fn read_events<R>(reader: R, buffer: &Buffer) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0;
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_no += 1;
        match parse_line(&line, chrono::Utc::now().timestamp()) {
            Ok(Some(event)) => {
                buffer.push(event).await;
                accepted += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping input line {}: {:#}", line_no, e),
        }
    }

    Ok(accepted)
}
