// Chat webhook bridge
//
// Receives chat platform webhooks and relays each user's messages to a
// persistent agent conversation.

use anyhow::{Context, Result};
use clap::Parser;
use kodegen_chat_bridge::server::{AppState, router, serve};
use kodegen_chat_bridge::{AgentBackend, AgentGateway, Bridge, BridgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BridgeConfig::parse();
    config.validate().context("invalid configuration")?;

    let backend = config
        .build_backend()
        .context("failed to initialise the agent backend")?;
    log::info!(
        "Starting chat-agent-bridge {} with the {} backend",
        kodegen_chat_bridge::VERSION,
        backend.name()
    );

    let outbound = config
        .build_outbound()
        .context("failed to build the messaging API client")?;

    let gateway = AgentGateway::with_timeout(backend, config.timeout());
    let bridge = Bridge::new(gateway, outbound, config.chunk_limit);
    let app = router(AppState::new(bridge, config.line_channel_secret.clone()));

    serve(config.bind_addr, app, shutdown_signal())
        .await
        .context("webhook server failed")?;

    log::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
