mod routes;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use fallah_core::{StockService, StockStore};
use fallah_platform::{
    PgStockStore, RedisBus, ServiceConfig, StoreBackend, connect_database, ensure_schema,
};
use fallah_stockstore::InMemoryStockStore;
use tracing::{info, warn};

use crate::routes::{AppState, router};

/// Adjustment and deletion logs are emitted from `fallah_core`.
const DEFAULT_LOG_FILTER: &str = "fallah_gateway=info,fallah_core=info";

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;

    let store: Arc<dyn StockStore> = match &config.store {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = connect_database(database_url, *max_connections).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgStockStore::new(pool))
        }
        StoreBackend::Memory => {
            warn!("using in-memory stock store; data is lost on restart");
            Arc::new(InMemoryStockStore::new())
        }
    };

    let alerts = match config.redis_url.as_deref() {
        Some(redis_url) => Some(RedisBus::connect(redis_url)?),
        None => {
            info!("REDIS_URL not set; low-stock alerts will not be published");
            None
        }
    };

    let state = AppState {
        service: StockService::new(store),
        alerts,
        history_embed_limit: config.history_embed_limit,
    };

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("stock gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
