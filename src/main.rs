//! capslock-hud: Caps Lock indicator agent for macOS
//!
//! Runs in the background and provides:
//! - Caps Lock detection via CGEventTap, gated on Accessibility trust
//! - A presenter state machine for a transient, auto-hiding overlay
//!
//! All detector and presenter state lives on one single-threaded loop; the
//! event tap runs on its own thread and only sends messages to it.

mod app;
mod capslock;
mod config;
mod events;
mod hud;
mod lifecycle;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::capslock::{EventTapBackend, SystemPermission};
use crate::config::Config;
use crate::events::HudEvent;
use crate::hud::LogRenderer;
use crate::lifecycle::ShutdownSignal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "capslock-hud starting");

    let config = Config::load()?;
    info!(
        source = ?config.source,
        hold_on_ms = config.timing.hold_on.as_millis() as u64,
        hold_off_ms = config.timing.hold_off.as_millis() as u64,
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Presenter -> diagnostics
    let (event_tx, mut event_rx) = broadcast::channel::<HudEvent>(64);
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(event = %json, "hud event"),
                    Err(e) => warn!(?e, "failed to encode hud event"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "hud event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut app = App::new(
        SystemPermission::new(),
        EventTapBackend::new(),
        LogRenderer::new(),
        &config,
        event_tx,
    );

    app.run(shutdown.wait()).await;

    info!("capslock-hud stopped");

    Ok(())
}
