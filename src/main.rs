use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_core::api;
use cache_core::cache::{RedisStore, TieredCacheBuilder};
use cache_core::env_config;
use cache_core::logging;
use cache_core::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    env_config::validate_env()?;

    if let Ok(logstash_host) = std::env::var("LOGSTASH_HOST") {
        logging::init_elk_logging(&logstash_host)?;
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "cache_core=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    env_config::log_env_config();

    let namespace =
        std::env::var("ONE_CACHE_NAMESPACE").unwrap_or_else(|_| "one_cache".to_string());
    let max_items: usize = std::env::var("ONE_CACHE_MAX_ITEMS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100_000);
    let default_ttl_seconds: u64 = std::env::var("ONE_CACHE_DEFAULT_TTL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);

    let mut builder = TieredCacheBuilder::new()
        .namespace(namespace)
        .max_items(max_items)
        .default_expiration(Duration::from_secs(default_ttl_seconds));

    if let Ok(redis_url) = std::env::var("REDIS_URL") {
        match RedisStore::connect(&redis_url).await {
            Ok(remote) => {
                tracing::info!("Connected to Redis for the remote cache tier");
                builder = builder.remote(Arc::new(remote));
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to connect to Redis, running with the local tier only"
                );
            }
        }
    }

    let cache = Arc::new(builder.build()?);
    let state = AppState::new(cache);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::routes(state).layer(cors);

    let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("SERVER_PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("{host}:{port}");

    tracing::info!("Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
