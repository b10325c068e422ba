// src/main.rs
use api_cache_poller::{
    api::ApiClient,
    cache::open_store,
    config::load_config,
    poller::Poller,
    utils::{log_level_from_env, setup_logging},
};
use log::{error, info};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // .env before logging so LOG_LEVEL can come from it
    dotenv::dotenv().ok();
    setup_logging(log_level_from_env())?;
    info!("api-cache-poller starting...");

    // --- Configuration & Initialization ---
    let app_config = load_config().map_err(|e| {
        error!("Refusing to start: {}", e);
        e
    })?;

    let store = open_store(&app_config.redis_url).await?;
    let api_client = Arc::new(ApiClient::new(&app_config)?);
    info!("API client ready: {:?}", api_client);

    let poller = Poller::new(&app_config, api_client, store);
    poller.run().await?;

    Ok(())
}
