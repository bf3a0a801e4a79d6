use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::dispatch::{ChunkProcessor, Event};
use crate::hipchat::RoomApi;

/// In-memory event queue drained into chunks on every flush
#[derive(Clone)]
pub struct Buffer {
    events: Arc<Mutex<Vec<Event>>>,
    // Serializes flushes so chunks reach the processor in arrival order
    flush_lock: Arc<Mutex<()>>,
    chunk_limit: usize,
}

impl Buffer {
    pub fn new(chunk_limit: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            flush_lock: Arc::new(Mutex::new(())),
            chunk_limit: chunk_limit.max(1),
        }
    }

    pub async fn push(&self, event: Event) {
        self.events.lock().await.push(event);
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Drain everything buffered so far into chunks of at most `chunk_limit` events.
    pub async fn take_chunks(&self) -> Vec<Vec<Event>> {
        let mut rest = std::mem::take(&mut *self.events.lock().await);
        let mut chunks = Vec::new();
        while rest.len() > self.chunk_limit {
            let tail = rest.split_off(self.chunk_limit);
            chunks.push(rest);
            rest = tail;
        }
        if !rest.is_empty() {
            chunks.push(rest);
        }
        chunks
    }
}

/// Hand every buffered chunk to the processor. Returns the number of events flushed.
pub async fn flush<C: RoomApi>(buffer: &Buffer, processor: &ChunkProcessor<C>) -> usize {
    let _guard = buffer.flush_lock.lock().await;

    let mut flushed = 0;
    for chunk in buffer.take_chunks().await {
        let report = processor.process(&chunk).await;
        if report.failed() > 0 {
            let tags: Vec<&str> = report.failures().map(|o| o.tag.as_str()).collect();
            info!(
                "Chunk {}: {} of {} records failed (tags: {:?})",
                report.chunk_id,
                report.failed(),
                chunk.len(),
                tags
            );
        }
        flushed += chunk.len();
    }
    flushed
}
