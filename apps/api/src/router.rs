use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentCellState;

pub fn create_router(state: Arc<AppointmentCellState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Teleclinic API is running!" }))
        .nest("/appointments", appointment_routes(state))
}
