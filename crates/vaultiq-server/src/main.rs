//! Reference Axum host embedding `vaultiq-core`.

mod config;
mod error;
mod request;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vaultiq_core::cache::{CacheProvider, RedisCacheProvider, StaticCacheInfrastructure};
use vaultiq_core::capabilities::{StaticIdentityProbe, SystemClock};
use vaultiq_core::config::{resolve, Family};
use vaultiq_core::gate::{self, Backends};
use vaultiq_core::store::{PostgresStore, RevocationBackend, SessionBackend};

use crate::config::Settings;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vaultiq_core=debug,vaultiq_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    tracing::info!(environment = %settings.environment, "configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await?;
    tracing::info!("database pool created");

    let redis_client = redis::Client::open(settings.redis.url.clone())?;
    let redis_conn = ConnectionManager::new(redis_client).await?;
    tracing::info!("redis connection established");

    let redis_provider: Arc<dyn CacheProvider> = Arc::new(RedisCacheProvider::new(redis_conn));
    let cache_infra = StaticCacheInfrastructure::new()
        .register(Family::Session.canonical_cache_alias(), redis_provider.clone())
        .register(Family::Revocation.canonical_cache_alias(), redis_provider.clone())
        .register(Family::UserSessionIndex.canonical_cache_alias(), redis_provider.clone())
        .register(Family::ActivityLog.canonical_cache_alias(), redis_provider);

    let resolved = resolve(&settings.persistence, &cache_infra)?;

    let store = Arc::new(PostgresStore::new(pool));
    let backends = Backends {
        session_store: Some(store.clone() as Arc<dyn SessionBackend>),
        revocation_store: Some(store as Arc<dyn RevocationBackend>),
    };

    let identity = Arc::new(StaticIdentityProbe("system".to_string()));
    let clock = Arc::new(SystemClock);

    let capabilities = gate::build(&resolved, &cache_infra, backends, identity, clock, None, None)?;
    let state = AppState::new(capabilities);

    let app = routes::create_router(state);
    let addr = settings.server.socket_addr();
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
