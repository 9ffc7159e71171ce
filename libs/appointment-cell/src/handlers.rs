// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentFilter, BookAppointmentRequest, Doctor, EditAppointmentRequest,
    HistoryInput, UpdateStatusRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

pub type LifecycleState = State<Arc<AppointmentLifecycleService>>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct DoctorsQuery {
    pub department: Option<String>,
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(service): LifecycleState,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request = body(payload)?;
    let appointment = service.book_appointment(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment booked successfully",
            "appointmentId": appointment.id
        })),
    ))
}

pub async fn list_appointments(
    State(service): LifecycleState,
    query: Result<Query<AppointmentFilter>, QueryRejection>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let Query(filter) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    Ok(Json(service.list_appointments(&filter).await?))
}

pub async fn get_appointment(
    State(service): LifecycleState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(service.get_appointment(appointment_id).await?))
}

pub async fn update_status(
    State(service): LifecycleState,
    Path(appointment_id): Path<Uuid>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = body(payload)?;
    let appointment = service.update_status(appointment_id, request.status).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Appointment status updated to {}", appointment.status)
    })))
}

pub async fn edit_appointment(
    State(service): LifecycleState,
    Path(appointment_id): Path<Uuid>,
    payload: Result<Json<EditAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = body(payload)?;
    service.edit_appointment(appointment_id, request).await?;

    Ok(Json(json!({
        "message": "Appointment updated successfully"
    })))
}

pub async fn delete_appointment(
    State(service): LifecycleState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service.delete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment deleted successfully"
    })))
}

// ==============================================================================
// HISTORY HANDLERS
// ==============================================================================

pub async fn add_history(
    State(service): LifecycleState,
    Path(appointment_id): Path<Uuid>,
    payload: Result<Json<HistoryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let input = body(payload)?;
    let record = service.add_history(appointment_id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": record
        })),
    ))
}

pub async fn get_history(
    State(service): LifecycleState,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let history = service.list_history(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "history": history
    })))
}

pub async fn get_patient_history(
    State(service): LifecycleState,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let history = service.list_patient_history(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "history": history
    })))
}

pub async fn update_history(
    State(service): LifecycleState,
    Path(history_id): Path<Uuid>,
    payload: Result<Json<HistoryInput>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let input = body(payload)?;
    let record = service.update_history(history_id, input).await?;
    info!("History record {} updated", history_id);

    Ok(Json(json!({
        "success": true,
        "data": record
    })))
}

pub async fn delete_history(
    State(service): LifecycleState,
    Path(history_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service.delete_history(history_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "History record deleted"
    })))
}

// ==============================================================================
// DIRECTORY HANDLERS
// ==============================================================================

pub async fn list_departments(State(service): LifecycleState) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(service.list_departments().await?))
}

pub async fn list_doctors(
    State(service): LifecycleState,
    Query(query): Query<DoctorsQuery>,
) -> Result<Json<Vec<Doctor>>, AppError> {
    let department = query
        .department
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("department is required".to_string()))?;

    Ok(Json(service.list_doctors_by_department(&department).await?))
}
