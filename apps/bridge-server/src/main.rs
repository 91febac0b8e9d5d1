// [[CRAFTLINK]]/apps/bridge-server/src/main.rs
// Purpose: Entry point. Loads config, connects the bot feed, then starts the server.
// Architecture: Application Boot
// Dependencies: Axum, Tower, Tokio

mod actuator;
mod buffer;
mod commands;
mod config;
mod decision;
mod error;
mod events;
mod feed;
mod inspect;
mod models;
mod movement;
mod observability;
mod reactions;
mod registry;
mod runtime;
mod server;

use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::actuator::HttpActuator;
use crate::config::BridgeConfig;
use crate::runtime::BridgeRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing();

    tracing::info!("Initializing CRAFTLINK bridge...");

    let config = BridgeConfig::from_env().context("Invalid bridge configuration")?;
    let bot = Arc::new(HttpActuator::new(config.bot_url.clone()));
    let runtime = Arc::new(BridgeRuntime::new(&config, bot));

    // === BOT EVENT FEED ===
    let shutdown = CancellationToken::new();
    let feed = tokio::spawn(feed::run_event_feed(
        config.bot_events_url.clone(),
        runtime.buffer(),
        shutdown.clone(),
    ));

    let app = server::router(runtime);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("CRAFTLINK bridge listening on http://{}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
            signal.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = feed.await {
        tracing::warn!("Event feed task ended abnormally: {}", e);
    }

    Ok(())
}
