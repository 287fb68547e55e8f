use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harmari_gateway::discord::build_discord_client;
use harmari_gateway::rank::cleanup::spawn_cleanup_task;
use harmari_gateway::{AppState, RankApiClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = harmari_core::Config::from_env()?;
    info!("Configuration loaded (rank API: {})", config.rank_api_url);

    // Initialize database
    let db = harmari_db::DbPool::new(config.db_path.as_deref()).await?;
    info!("Harmari database initialized");

    let rank_api = RankApiClient::new(&config.rank_api_url);
    let state = Arc::new(AppState::new(db, rank_api));

    // Sweeps stale in-flight rows left behind by a previous crash, then keeps
    // the request store pruned while the bot runs.
    spawn_cleanup_task(Arc::clone(&state));

    // Run the Discord client (this blocks)
    let mut client = build_discord_client(&config.discord_token, state).await?;
    info!("Starting Discord client");
    client.start().await?;

    Ok(())
}
