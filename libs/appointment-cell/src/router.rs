// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{LiveNotificationService, SchedulingService};

pub fn scheduling_routes(config: Arc<AppConfig>, scheduling: Arc<SchedulingService>) -> Router {
    // Every scheduling operation requires an authenticated caller
    Router::new()
        // Doctor availability
        .route("/doctors/{doctor_id}/slots", get(handlers::list_available_slots))
        .route("/slots", post(handlers::create_slot))
        .route(
            "/slots/{slot_id}",
            get(handlers::get_slot)
                .put(handlers::edit_slot)
                .delete(handlers::delete_slot),
        )
        // Appointments
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/appointments/{appointment_id}/status",
            patch(handlers::update_appointment_status),
        )
        .route(
            "/appointments/{appointment_id}/notifications",
            get(handlers::list_appointment_notifications),
        )
        // Caller's own listings
        .route("/patients/me/appointments", get(handlers::list_my_patient_appointments))
        .route("/doctors/me/appointments", get(handlers::list_my_doctor_appointments))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(scheduling)
}

/// Authenticated websocket feed of the caller's scheduling events.
pub fn live_routes(config: Arc<AppConfig>, live: Arc<LiveNotificationService>) -> Router {
    Router::new()
        .route("/live", get(handlers::live_updates))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(live)
}
