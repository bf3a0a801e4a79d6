mod buffer;
mod config;
mod dispatch;
mod hipchat;
mod input;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::buffer::Buffer;
use crate::config::Config;
use crate::dispatch::{ChunkProcessor, DispatchSettings, Dispatcher};
use crate::hipchat::HipChatClient;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hipchat_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("hipchat-relay.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let settings = DispatchSettings::from_config(&config.dispatch);
    info!("Configuration loaded successfully");
    info!("  API: {}", config.hipchat.base_uri());
    info!(
        "  Default room: {}",
        settings.default_room.as_deref().unwrap_or("(none)")
    );
    info!("  Default from: {}", settings.default_from);
    info!("  Message key: {}", settings.key_name);
    info!(
        "  Flush every {}s, up to {} records per chunk",
        config.buffer.flush_interval, config.buffer.chunk_limit
    );

    let client = HipChatClient::new(&config.hipchat)?;
    let processor = Arc::new(ChunkProcessor::new(Dispatcher::new(client, settings)));
    let buffer = Buffer::new(config.buffer.chunk_limit);

    let mut scheduler = Scheduler::new().await?;
    {
        let buffer = buffer.clone();
        let processor = Arc::clone(&processor);
        scheduler
            .add_repeated_job(
                Duration::from_secs(config.buffer.flush_interval),
                "flush",
                move || {
                    let buffer = buffer.clone();
                    let processor = Arc::clone(&processor);
                    Box::pin(async move {
                        buffer::flush(&buffer, &*processor).await;
                    })
                },
            )
            .await?;
    }
    scheduler.start().await?;

    info!("Reading events from stdin...");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let accepted = input::read_events(stdin, &buffer).await?;

    info!(
        "Input closed after {} events, flushing {} pending",
        accepted,
        buffer.len().await
    );
    buffer::flush(&buffer, &*processor).await;
    scheduler.shutdown().await?;

    Ok(())
}
