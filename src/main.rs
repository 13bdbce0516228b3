//! Card Duel Server
//!
//! Loads the card catalog and serves duels over WebSocket.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use card_duel::{
    VERSION,
    game::catalog::CardCatalog,
    network::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Card Duel Server v{}", VERSION);

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    info!(
        "Turns: {}, turn time: {:?}, tick: {:?}",
        config.match_config.total_turns, config.match_config.turn_duration, config.tick_interval
    );

    let catalog = CardCatalog::load(&config.catalog_path).with_context(|| {
        format!("failed to load card catalog from {}", config.catalog_path.display())
    })?;

    let server = Arc::new(GameServer::new(config, Arc::new(catalog)));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_server.shutdown();
        }
    });

    server.run().await?;
    info!("Server stopped");

    Ok(())
}
