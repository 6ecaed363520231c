// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::AppointmentCellState;

pub fn appointment_routes(state: Arc<AppointmentCellState>) -> Router {
    // Every appointment operation requires an authenticated caller.
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/feed/status", get(handlers::get_feed_status))
        .route("/waiting-room/{doctor_id}", get(handlers::get_waiting_room))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/waiting-room/join", post(handlers::join_waiting_room))
        .route("/{appointment_id}/waiting-room/leave", post(handlers::leave_waiting_room))
        .route("/{appointment_id}/start", post(handlers::start_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
