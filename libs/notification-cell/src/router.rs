use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{clear_read_state, get_notifications, mark_all_as_read, mark_as_read, NotificationState};

pub fn create_notification_router(state: Arc<NotificationState>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/notifications", get(get_notifications))
        .route("/notifications/read", post(mark_as_read))
        .route("/notifications/read-all", post(mark_all_as_read))
        .route("/notifications/read-state", delete(clear_read_state))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
