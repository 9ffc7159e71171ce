// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentHistoryRecord, AppointmentStatus,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Io(String),
}

impl From<StoreError> for AppointmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppointmentError::NotFound,
            StoreError::Io(msg) => AppointmentError::Io(msg),
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Persistence boundary for appointments. No business rules live here.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Appointment>, StoreError>;

    async fn list_by_filter(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    /// Replaces the stored row. `NotFound` if it does not exist.
    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Touches `status` and `updated_at` only.
    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;

    /// Hard delete; the appointment's history records go with it.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AppointmentHistoryRecord>, StoreError>;

    /// Newest first.
    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, StoreError>;

    /// Newest first.
    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, StoreError>;

    async fn update(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Inserts the record and marks its appointment `completed` as one unit
    /// of work. `NotFound` if the appointment is gone.
    async fn record_visit(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError>;
}

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    history: HashMap<Uuid, AppointmentHistoryRecord>,
}

/// Both tables sit behind one lock so `record_visit` and cascading deletes
/// are observed atomically.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut records: Vec<AppointmentHistoryRecord>) -> Vec<AppointmentHistoryRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

fn booking_order(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.appointment_date.cmp(&a.appointment_date))
    });
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        tables.appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(booking_order(tables.appointments.values().cloned().collect()))
    }

    async fn list_by_filter(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(booking_order(
            tables
                .appointments
                .values()
                .filter(|a| filter.matches(a))
                .cloned()
                .collect(),
        ))
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .appointments
            .get_mut(&appointment.id)
            .ok_or(StoreError::NotFound)?;
        *slot = appointment.clone();
        Ok(appointment)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let appointment = tables.appointments.get_mut(&id).ok_or(StoreError::NotFound)?;
        appointment.status = status;
        appointment.updated_at = Some(updated_at);
        Ok(appointment.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.appointments.remove(&id).ok_or(StoreError::NotFound)?;
        tables.history.retain(|_, record| record.appointment_id != id);
        debug!("Deleted appointment {} and its history", id);
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn create(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError> {
        let mut tables = self.tables.write().await;
        tables.history.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AppointmentHistoryRecord>, StoreError> {
        Ok(self.tables.read().await.history.get(&id).cloned())
    }

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .history
                .values()
                .filter(|r| r.appointment_id == appointment_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .history
                .values()
                .filter(|r| r.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }

    async fn update(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables.history.get_mut(&record.id).ok_or(StoreError::NotFound)?;
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.history.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn record_visit(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError> {
        let mut tables = self.tables.write().await;
        let appointment = tables
            .appointments
            .get_mut(&record.appointment_id)
            .ok_or(StoreError::NotFound)?;
        appointment.status = AppointmentStatus::Completed;
        appointment.updated_at = Some(record.created_at);
        tables.history.insert(record.id, record.clone());
        debug!("Recorded visit {} for appointment {}", record.id, record.appointment_id);
        Ok(record)
    }
}
