use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentLifecycleService};
use notification_cell::{create_notification_router, handlers::NotificationState};
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    lifecycle: Arc<AppointmentLifecycleService>,
    notifications: Arc<NotificationState>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Hospital appointment API is running!" }))
        .merge(appointment_routes(lifecycle))
        .merge(create_notification_router(notifications, config))
}
