use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::get_queue_stats;
use crate::SerialWorkQueue;

pub fn create_booking_queue_router(queue: Arc<SerialWorkQueue>) -> Router {
    Router::new()
        .route("/stats", get(get_queue_stats))
        .with_state(queue)
}
