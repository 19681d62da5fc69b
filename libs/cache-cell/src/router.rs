use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::get_cache_stats;
use crate::services::CacheManager;

pub fn create_cache_router(cache: Arc<CacheManager>) -> Router {
    Router::new()
        .route("/stats", get(get_cache_stats))
        .with_state(cache)
}
