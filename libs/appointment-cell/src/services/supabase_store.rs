// libs/appointment-cell/src/services/supabase_store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentFilter, AppointmentHistoryRecord, AppointmentStatus};
use crate::services::store::{AppointmentStore, HistoryStore, StoreError};

const APPOINTMENTS: &str = "/rest/v1/appointments";
const HISTORY: &str = "/rest/v1/appointment_history";

/// Database function inserting a history row and completing its
/// appointment in one transaction.
pub const RECORD_VISIT_FUNCTION: &str = "record_appointment_visit";

/// PostgREST-backed appointment and history tables.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, StoreError> {
        Ok(self.supabase.request(Method::GET, path, None, None).await?)
    }

    async fn write_one<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> Result<T, StoreError> {
        let rows = self.supabase.request_returning(method, path, Some(body)).await?;
        let row = rows.into_iter().next().ok_or(StoreError::NotFound)?;
        serde_json::from_value(row).map_err(|e| StoreError::Io(e.to_string()))
    }

    fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
        serde_json::to_value(value).map_err(|e| StoreError::Io(e.to_string()))
    }
}

pub fn filter_query(filter: &AppointmentFilter) -> String {
    let mut params = Vec::new();

    if let Some(email) = &filter.patient_email {
        params.push(format!("patient_email=eq.{}", urlencoding::encode(&email.trim().to_lowercase())));
    }
    if let Some(doctor_id) = filter.doctor_id {
        params.push(format!("doctor_id=eq.{}", doctor_id));
    }
    if let Some(doctor_name) = &filter.doctor_name {
        params.push(format!("doctor_name=eq.{}", urlencoding::encode(doctor_name)));
    }
    if let Some(department) = &filter.department {
        params.push(format!("department=eq.{}", urlencoding::encode(department)));
    }
    if let Some(status) = filter.status {
        params.push(format!("status=eq.{}", status));
    }
    params.push("order=created_at.desc".to_string());

    params.join("&")
}

#[async_trait]
impl AppointmentStore for SupabaseStore {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let body = Self::to_body(&appointment)?;
        let created: Appointment = self.write_one(Method::POST, APPOINTMENTS, body).await?;
        info!("Inserted appointment {}", created.id);
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows: Vec<Appointment> = self.fetch(&format!("{}?id=eq.{}", APPOINTMENTS, id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, StoreError> {
        self.fetch(&format!("{}?order=created_at.desc", APPOINTMENTS)).await
    }

    async fn list_by_filter(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?{}", APPOINTMENTS, filter_query(filter));
        debug!("Filtering appointments: {}", path);
        self.fetch(&path).await
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, appointment.id);
        let body = Self::to_body(&appointment)?;
        self.write_one(Method::PATCH, &path, body).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, id);
        self.write_one(
            Method::PATCH,
            &path,
            json!({ "status": status, "updated_at": updated_at }),
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        if AppointmentStore::get_by_id(self, id).await?.is_none() {
            return Err(StoreError::NotFound);
        }

        let _: Value = self
            .supabase
            .request(Method::DELETE, &format!("{}?appointment_id=eq.{}", HISTORY, id), None, None)
            .await?;
        let _: Value = self
            .supabase
            .request(Method::DELETE, &format!("{}?id=eq.{}", APPOINTMENTS, id), None, None)
            .await?;

        info!("Deleted appointment {} and its history", id);
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SupabaseStore {
    async fn create(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError> {
        let body = Self::to_body(&record)?;
        self.write_one(Method::POST, HISTORY, body).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AppointmentHistoryRecord>, StoreError> {
        let rows: Vec<AppointmentHistoryRecord> = self.fetch(&format!("{}?id=eq.{}", HISTORY, id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, StoreError> {
        self.fetch(&format!(
            "{}?appointment_id=eq.{}&order=created_at.desc",
            HISTORY, appointment_id
        ))
        .await
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, StoreError> {
        self.fetch(&format!(
            "{}?patient_id=eq.{}&order=created_at.desc",
            HISTORY, patient_id
        ))
        .await
    }

    async fn update(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError> {
        let path = format!("{}?id=eq.{}", HISTORY, record.id);
        let body = Self::to_body(&record)?;
        self.write_one(Method::PATCH, &path, body).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let deleted = self
            .supabase
            .request_returning(Method::DELETE, &format!("{}?id=eq.{}", HISTORY, id), None)
            .await?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn record_visit(&self, record: AppointmentHistoryRecord) -> Result<AppointmentHistoryRecord, StoreError> {
        let body = json!({ "p_record": Self::to_body(&record)? });
        let stored: Option<AppointmentHistoryRecord> = self.supabase.rpc(RECORD_VISIT_FUNCTION, body).await?;
        stored.ok_or(StoreError::NotFound)
    }
}
