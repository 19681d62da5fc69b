use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::{QueueStats, SerialWorkQueue};

/// Current queue counters and health.
pub async fn get_queue_stats(State(queue): State<Arc<SerialWorkQueue>>) -> Json<QueueStats> {
    Json(queue.stats())
}
