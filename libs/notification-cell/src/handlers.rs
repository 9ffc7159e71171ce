use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};
use chrono::FixedOffset;
use serde_json::{json, Value};
use tracing::info;

use appointment_cell::services::Clock;
use shared_models::{auth::User, error::AppError};

use crate::services::{
    center::NotificationCenter, feed::AppointmentFeed, read_state::{ReadStateBackend, ReadStateTracker},
};
use crate::{MarkAllReadRequest, MarkReadRequest, NotificationError, NotificationKey, Viewer};

/// Shared collaborators; a fresh `NotificationCenter` is scoped to each caller.
pub struct NotificationState {
    pub feed: Arc<dyn AppointmentFeed>,
    pub read_state: Arc<dyn ReadStateBackend>,
    pub clock: Arc<dyn Clock>,
    pub clinic_offset: FixedOffset,
}

impl NotificationState {
    pub fn tracker_for(&self, user: &User) -> ReadStateTracker {
        ReadStateTracker::new(self.read_state.clone(), user.id.clone())
    }

    pub fn center_for(&self, user: &User) -> Result<NotificationCenter, NotificationError> {
        let viewer = Viewer::from_user(user)?;
        Ok(NotificationCenter::new(
            viewer,
            self.feed.clone(),
            self.tracker_for(user),
            self.clock.clone(),
            self.clinic_offset,
        ))
    }
}

type NotificationStateRef = State<Arc<NotificationState>>;

/// Current notifications of the caller
pub async fn get_notifications(
    State(state): NotificationStateRef,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let center = state.center_for(&user)?;
    let set = center.refresh().await;

    Ok(Json(json!({
        "success": true,
        "new_requests": set.new_requests,
        "today": set.today
    })))
}

/// Acknowledge one notification
pub async fn mark_as_read(
    State(state): NotificationStateRef,
    Extension(user): Extension<User>,
    payload: Result<Json<MarkReadRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let key = NotificationKey::new(request.appointment_id, request.kind);

    state.tracker_for(&user).add(key).await?;

    Ok(Json(json!({
        "success": true,
        "key": key
    })))
}

/// Acknowledge everything the caller is displaying. Only the submitted keys
/// are recorded; bookings that arrived after the caller's last poll stay unread.
pub async fn mark_all_as_read(
    State(state): NotificationStateRef,
    Extension(user): Extension<User>,
    payload: Result<Json<MarkAllReadRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let keys: HashSet<NotificationKey> = request.keys.into_iter().collect();

    state.tracker_for(&user).add_all(keys.iter().copied()).await?;
    info!("User {} marked {} notification(s) read", user.id, keys.len());

    Ok(Json(json!({
        "success": true,
        "marked": keys.len()
    })))
}

/// Forget the caller's acknowledgements (logout)
pub async fn clear_read_state(
    State(state): NotificationStateRef,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    state.tracker_for(&user).clear().await?;
    info!("Read-state cleared for user {}", user.id);

    Ok(Json(json!({
        "success": true
    })))
}
