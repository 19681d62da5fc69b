use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::CacheStats;
use crate::services::CacheManager;

pub async fn get_cache_stats(State(cache): State<Arc<CacheManager>>) -> Json<CacheStats> {
    Json(cache.stats().await)
}
