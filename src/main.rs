//! # Chat Gateway
//!
//! Application entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Database pool and presence store
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chat_gateway::config::Settings;
use chat_gateway::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings first: the log format is configurable.
    let settings = Settings::load()?;
    chat_gateway::telemetry::init_tracing(settings.telemetry.json);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        presence = ?settings.presence.backend,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Gateway ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
