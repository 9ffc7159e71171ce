// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::handlers;
use crate::services::lifecycle::AppointmentLifecycleService;

pub fn appointment_routes(service: Arc<AppointmentLifecycleService>) -> Router {
    Router::new()
        // Booking and administration
        .route("/appointment", post(handlers::book_appointment))
        .route(
            "/appointment/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::edit_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/appointments", get(handlers::list_appointments))
        .route("/appointments/{appointment_id}", patch(handlers::update_status))

        // Visit history
        .route(
            "/api/appointments/{appointment_id}/history",
            post(handlers::add_history).get(handlers::get_history),
        )
        .route("/api/patients/{patient_id}/history", get(handlers::get_patient_history))
        .route(
            "/api/history/{history_id}",
            put(handlers::update_history).delete(handlers::delete_history),
        )

        // Directory
        .route("/departments", get(handlers::list_departments))
        .route("/doctors", get(handlers::list_doctors))
        .with_state(service)
}
