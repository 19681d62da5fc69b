use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    InMemoryStore, LiveNotificationService, PostgrestStore, SchedulingComponents, SchedulingService,
};
use booking_queue_cell::SerialWorkQueue;
use cache_cell::{CacheManager, CacheStore, InMemoryCacheStore, RedisCacheStore};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        warn!("SUPABASE_JWT_SECRET is empty; every authenticated request will be rejected");
    }

    // Process-wide components, torn down in reverse on shutdown
    let cache = Arc::new(CacheManager::new(build_cache_store(&config).await));
    let live = Arc::new(LiveNotificationService::new());
    let queue = Arc::new(SerialWorkQueue::start());
    let components = build_components(&config, Arc::clone(&cache), Arc::clone(&live));
    let scheduling = Arc::new(SchedulingService::new(components, Arc::clone(&queue), &config));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(Arc::clone(&config), scheduling, live, Arc::clone(&queue), cache)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let every accepted booking finish before exiting
    queue.shutdown().await.context("Failed to drain the work queue")?;
    info!("Scheduling API stopped");
    Ok(())
}

async fn build_cache_store(config: &AppConfig) -> Arc<dyn CacheStore> {
    if let Some(redis_url) = &config.redis_url {
        match RedisCacheStore::new(redis_url).await {
            Ok(store) => {
                info!("Using Redis cache");
                return Arc::new(store);
            }
            Err(e) => warn!("Redis unavailable ({}), falling back to in-memory cache", e),
        }
    }
    Arc::new(InMemoryCacheStore::new())
}

fn build_components(
    config: &AppConfig,
    cache: Arc<CacheManager>,
    live: Arc<LiveNotificationService>,
) -> SchedulingComponents {
    if config.is_database_configured() {
        info!("Using PostgREST store at {}", config.supabase_url);
        let supabase = Arc::new(SupabaseClient::new(config));
        SchedulingComponents::from_store(Arc::new(PostgrestStore::new(supabase)), cache, live)
    } else {
        warn!("No database configured, scheduling data lives in memory only");
        SchedulingComponents::from_store(Arc::new(InMemoryStore::new()), cache, live)
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
    }
}
