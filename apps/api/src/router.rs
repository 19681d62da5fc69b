use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{live_routes, scheduling_routes, LiveNotificationService, SchedulingService};
use booking_queue_cell::{create_booking_queue_router, SerialWorkQueue};
use cache_cell::{create_cache_router, CacheManager};
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    scheduling: Arc<SchedulingService>,
    live: Arc<LiveNotificationService>,
    queue: Arc<SerialWorkQueue>,
    cache: Arc<CacheManager>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Scheduling API is running!" }))
        .nest(
            "/api",
            scheduling_routes(Arc::clone(&config), scheduling)
                .merge(live_routes(config, live))
                .nest("/queue", create_booking_queue_router(queue))
                .nest("/cache", create_cache_router(cache)),
        )
}
