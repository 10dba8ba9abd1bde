use std::sync::Arc;

use sss_case_api::auth::JwtIdentityProvider;
use sss_case_api::clock::SystemClock;
use sss_case_api::{config, database, router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")))
        .init();

    let config = config::config();
    tracing::info!("Starting SSS Case API in {:?} mode", config.environment);

    let store = database::open_store(&config.database).await?;
    let identity = Arc::new(JwtIdentityProvider::from_config(&config.security)?);
    let state = AppState::new(store, identity, Arc::new(SystemClock));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("SSS Case API listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
