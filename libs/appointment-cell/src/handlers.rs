// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    response::Response,
    Json,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::AuthContext;
use shared_models::error::AppError;

use crate::models::{AppointmentListQuery, BookAppointmentRequest, SlotRangeRequest, UpdateStatusRequest};
use crate::services::live::LiveReceiver;
use crate::services::{LiveNotificationService, SchedulingService};

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

pub async fn list_available_slots(
    State(scheduling): State<Arc<SchedulingService>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slots = scheduling.list_available_slots(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "total": slots.len(),
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn create_slot(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<SlotRangeRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let slot = scheduling.create_slot(caller, request.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "slot": slot,
            "message": "Slot created"
        })),
    ))
}

pub async fn get_slot(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slot = scheduling.get_slot(slot_id, &caller).await?;
    Ok(Json(json!({ "success": true, "slot": slot })))
}

pub async fn edit_slot(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<SlotRangeRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = scheduling.edit_slot(slot_id, caller, request.into()).await?;

    Ok(Json(json!({
        "success": true,
        "slot": slot,
        "message": "Slot updated"
    })))
}

pub async fn delete_slot(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slot = scheduling.delete_slot(slot_id, caller).await?;

    Ok(Json(json!({
        "success": true,
        "slot": slot,
        "message": "Slot deleted"
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = scheduling.book_appointment(caller, request.slot_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked"
        })),
    ))
}

pub async fn get_appointment(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduling.get_appointment(appointment_id, &caller).await?;
    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

pub async fn update_appointment_status(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduling
        .transition_status(appointment_id, request.status, caller)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Appointment {}", appointment.status)
    })))
}

pub async fn list_appointment_notifications(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notifications = scheduling.list_notifications(appointment_id, &caller).await?;

    Ok(Json(json!({
        "success": true,
        "total": notifications.len(),
        "notifications": notifications
    })))
}

pub async fn list_my_patient_appointments(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = scheduling.list_patient_appointments(&caller, query.status).await?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments
    })))
}

pub async fn list_my_doctor_appointments(
    State(scheduling): State<Arc<SchedulingService>>,
    Extension(caller): Extension<AuthContext>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = scheduling.list_doctor_appointments(&caller, query.status).await?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments
    })))
}

// ==============================================================================
// LIVE UPDATES
// ==============================================================================

/// Upgrades to a websocket that carries every event pushed to the caller.
pub async fn live_updates(
    ws: WebSocketUpgrade,
    State(live): State<Arc<LiveNotificationService>>,
    Extension(caller): Extension<AuthContext>,
) -> Response {
    // Subscribed before the upgrade so nothing pushed meanwhile is lost.
    let events = live.subscribe(caller.person_id).await;
    info!("Live connection opened for {}", caller.person_id);
    ws.on_upgrade(move |socket| forward_live_events(socket, live, caller.person_id, events))
}

async fn forward_live_events(
    socket: WebSocket,
    live: Arc<LiveNotificationService>,
    user_id: Uuid,
    mut events: LiveReceiver,
) {
    let (mut sink, mut incoming) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => {
                    if sink.send(Message::Text(message.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Live connection of {} lagged, {} events dropped", user_id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => debug!("Ignoring client message on live connection of {}", user_id),
            },
        }
    }

    drop(events);
    live.release_channel(user_id).await;
    info!("Live connection closed for {}", user_id);
}
