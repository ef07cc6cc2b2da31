use airtel_gateway::api::{self, AppState};
use airtel_gateway::config::Config;
use airtel_gateway::database::{
    self, AirtelTransactionRepository, LedgerRepository, RequestLogRepository, UserRepository,
};
use airtel_gateway::logging;
use airtel_gateway::payments::providers::{AirtelProvider, AirtelProviderConfig};
use airtel_gateway::payments::token::{MemoryTokenStore, TokenStore};
use airtel_gateway::services::{GatewayService, GatewaySettings, PollConfig};
use airtel_gateway::workers::{CleanupConfig, CleanupWorker};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_tracing();

    let config = Config::from_env()?;

    info!("Starting Airtel Africa gateway");
    info!("Environment: {}", config.server.environment);
    info!(
        airtel_environment = %config.airtel.environment,
        country = %config.airtel.country,
        "Airtel Africa settings loaded"
    );

    let pool = database::init_pool(
        &config.database.url,
        Some(database::PoolConfig {
            max_connections: config.database.max_connections,
            ..Default::default()
        }),
    )
    .await?;

    if config.database.apply_schema {
        database::apply_schema(&pool).await?;
        info!("Database schema applied");
    }

    let tokens = token_store(&config).await;
    let request_logs = Arc::new(RequestLogRepository::new(pool.clone()));
    let provider = Arc::new(AirtelProvider::with_stores(
        AirtelProviderConfig::from(&config.airtel),
        tokens,
        request_logs.clone(),
    )?);

    let store = Arc::new(AirtelTransactionRepository::new(pool.clone()));
    let service = Arc::new(GatewayService::new(
        provider.clone(),
        Arc::new(LedgerRepository::new(pool.clone())),
        Arc::new(UserRepository::new(pool.clone())),
        store.clone(),
        request_logs,
        GatewaySettings {
            environment: config.airtel.environment,
            surcharge: config.gateway.surcharge,
            merchant_country: config.airtel.country.clone(),
            poll: PollConfig {
                steps: config.gateway.poll_steps,
                interval: config.gateway.poll_interval(),
            },
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cleanup = CleanupWorker::new(
        store,
        CleanupConfig {
            interval: config.gateway.cleanup_interval(),
            max_age: config.gateway.cleanup_max_age(),
        },
    );
    let cleanup_handle = tokio::spawn(cleanup.run(shutdown_rx.clone()));

    let app = api::router(AppState {
        service,
        provider,
        db: Some(pool),
        shutdown: shutdown_rx,
        environment: config.server.environment.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for ctrl-c");
                return;
            }
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Err(e) = cleanup_handle.await {
        warn!(error = %e, "Cleanup worker ended abnormally");
    }

    info!("Server stopped");
    Ok(())
}

#[cfg(feature = "cache")]
async fn token_store(config: &Config) -> Arc<dyn TokenStore> {
    use airtel_gateway::cache::{self, CacheConfig, RedisCache, RedisTokenStore};

    let Some(redis) = &config.redis else {
        return Arc::new(MemoryTokenStore::new());
    };

    match cache::init_cache_pool(CacheConfig {
        redis_url: redis.url.clone(),
        ..Default::default()
    })
    .await
    {
        Ok(pool) => Arc::new(RedisTokenStore::new(
            RedisCache::new(pool),
            &config.airtel.environment.to_string(),
            config.airtel.active_client_id(),
        )),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, caching the Airtel token in memory");
            Arc::new(MemoryTokenStore::new())
        }
    }
}

#[cfg(not(feature = "cache"))]
async fn token_store(_config: &Config) -> Arc<dyn TokenStore> {
    Arc::new(MemoryTokenStore::new())
}
