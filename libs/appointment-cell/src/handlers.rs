// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentError, BookAppointmentRequest};
use crate::AppointmentCellState;

fn map_appointment_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::RecordNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        AppointmentError::NotAuthorized => {
            AppError::Forbidden("Not authorized to act on this appointment".to_string())
        }
        AppointmentError::InvalidTransition { .. } => AppError::BadRequest(error.to_string()),
        AppointmentError::StoreConflict => AppError::Conflict(
            "Appointment was modified concurrently; re-fetch and retry".to_string(),
        ),
        AppointmentError::Validation(message) => AppError::BadRequest(message),
        AppointmentError::Store(message) => AppError::Database(message),
        AppointmentError::Identity(message) => AppError::ExternalService(message),
    }
}

fn actor_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Subject claim is not a valid user id".to_string()))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    // Patients book for themselves; admins and doctors may book on behalf.
    let is_patient = request.patient_id == actor;
    if !is_patient && !user.is_admin() && !user.is_doctor() {
        return Err(AppError::Forbidden(
            "Not authorized to book appointment for this patient".to_string(),
        ));
    }

    let appointment = state
        .lifecycle
        .book(request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    let appointment = state
        .lifecycle
        .get(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    if !appointment.involves(actor) && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn join_waiting_room(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    let appointment = state
        .lifecycle
        .join_waiting_room(appointment_id, actor)
        .await
        .map_err(map_appointment_error)?;

    // The join is committed at this point; a failed queue read only costs
    // the position hint, never the result.
    let queue_position = match state
        .waiting_room
        .position(appointment.doctor_id, appointment.id)
        .await
    {
        Ok(position) => position,
        Err(error) => {
            warn!(
                "Queue position lookup failed after join of appointment {}: {}",
                appointment.id, error
            );
            None
        }
    };

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "queue_position": queue_position,
        "message": "Joined the waiting room"
    })))
}

#[axum::debug_handler]
pub async fn leave_waiting_room(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    let appointment = state
        .lifecycle
        .leave_waiting_room(appointment_id, actor)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Left the waiting room"
    })))
}

#[axum::debug_handler]
pub async fn start_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    let appointment = state
        .lifecycle
        .start(appointment_id, actor)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Consultation started"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    let appointment = state
        .lifecycle
        .complete(appointment_id, actor)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Consultation completed"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    let appointment = state
        .lifecycle
        .cancel(appointment_id, actor)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn get_waiting_room(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    if actor != doctor_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this waiting room".to_string(),
        ));
    }

    let waiting = state
        .waiting_room
        .list_waiting(doctor_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "count": waiting.len(),
        "waiting": waiting
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    if actor != patient_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let appointments = state
        .lifecycle
        .list_for_patient(patient_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;

    if actor != doctor_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let appointments = state
        .lifecycle
        .list_for_doctor(doctor_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

/// Admin view of the live change-feed fan-out.
#[axum::debug_handler]
pub async fn get_feed_status(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Admin access required".to_string(),
        ));
    }

    let (doctor_channels, patient_channels) = state.feed.active_channels().await;

    Ok(Json(json!({
        "success": true,
        "active_doctor_channels": doctor_channels,
        "active_patient_channels": patient_channels
    })))
}
