use std::net::SocketAddr;
use std::sync::Arc;

use notchpay_gateway::api::{self, ApiState, ServiceInfo};
use notchpay_gateway::config::Config;
use notchpay_gateway::orders::OrderStore;
use notchpay_gateway::payments::dispatch::{DeliveryJournal, NoJournal, WebhookDispatcher};
use notchpay_gateway::payments::providers::NotchPayProvider;
use notchpay_gateway::payments::NotchPayGateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting Notch Pay gateway");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Notch Pay sandbox mode: {}", config.notchpay.sandbox);
    tracing::info!("Autocomplete orders: {}", config.notchpay.autocomplete_orders);

    #[cfg(feature = "database")]
    let (store, db_pool): (Arc<dyn OrderStore>, Option<sqlx::PgPool>) = match &config.database {
        Some(database) => {
            use notchpay_gateway::database::{self, OrderRepository, PoolConfig};
            let pool = database::init_pool(
                &database.url,
                Some(PoolConfig {
                    max_connections: database.max_connections,
                    ..PoolConfig::default()
                }),
            )
            .await?;
            database::run_migrations(&pool).await?;
            let store: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(pool.clone()));
            (store, Some(pool))
        }
        None => anyhow::bail!("DATABASE_URL not set"),
    };
    #[cfg(not(feature = "database"))]
    let store: Arc<dyn OrderStore> = {
        tracing::warn!("Built without the database feature, orders are kept in memory");
        Arc::new(notchpay_gateway::orders::MemoryOrderStore::new())
    };

    #[cfg(feature = "cache")]
    let (journal, redis_pool): (Arc<dyn DeliveryJournal>, Option<notchpay_gateway::cache::RedisPool>) =
        match &config.redis {
            Some(redis) => {
                use notchpay_gateway::cache::{self, CacheConfig, RedisCache, RedisDeliveryJournal};
                let pool = cache::init_cache_pool(CacheConfig {
                    redis_url: redis.url.clone(),
                    ..CacheConfig::default()
                })
                .await?;
                let journal: Arc<dyn DeliveryJournal> =
                    Arc::new(RedisDeliveryJournal::new(RedisCache::new(pool.clone())));
                (journal, Some(pool))
            }
            None => {
                tracing::info!("REDIS_URL not set, webhook delivery journal disabled");
                let journal: Arc<dyn DeliveryJournal> = Arc::new(NoJournal);
                (journal, None)
            }
        };
    #[cfg(not(feature = "cache"))]
    let journal: Arc<dyn DeliveryJournal> = Arc::new(NoJournal);

    let provider = Arc::new(NotchPayProvider::new(config.provider_config())?);
    let gateway = Arc::new(NotchPayGateway::new(
        provider,
        store,
        config.gateway_settings(),
    ));
    let webhooks = Arc::new(WebhookDispatcher::new(gateway.clone(), journal));

    let state = ApiState::new(gateway, webhooks, ServiceInfo::from_config(&config));
    #[cfg(feature = "database")]
    let state = match db_pool {
        Some(pool) => state.with_database(pool),
        None => state,
    };
    #[cfg(feature = "cache")]
    let state = match redis_pool {
        Some(pool) => state.with_cache(pool),
        None => state,
    };

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
