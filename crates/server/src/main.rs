use std::{net::SocketAddr, sync::Arc};

use poll_vote::{PgStore, VoteBackend, VoteService, config::Config, routes};
use tracing_subscriber::EnvFilter;

// ===== Main =====

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;

    match &config.database_url {
        Some(database_url) => {
            let store = PgStore::connect(database_url, config.db_max_connections).await?;
            store.migrate().await?;
            tracing::info!("Connected to database");
            serve(store, config.bind_addr).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, polls and votes are kept in memory");
            serve(VoteService::new(), config.bind_addr).await
        }
    }
}

async fn serve<B: VoteBackend>(backend: B, addr: SocketAddr) -> anyhow::Result<()> {
    let app = routes::router(Arc::new(backend));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
