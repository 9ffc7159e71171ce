// libs/appointment-cell/src/services/directory.rs
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Doctor, Patient};
use crate::services::store::StoreError;

#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn list_departments(&self) -> Result<Vec<String>, StoreError>;

    async fn list_doctors_by_department(&self, department: &str) -> Result<Vec<Doctor>, StoreError>;

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError>;
}

/// Fixed directory used when no database is configured, and by tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    departments: Vec<String>,
    doctors: Vec<Doctor>,
    patients: Vec<Patient>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded() -> Self {
        Self::new()
            .with_departments([
                "Cardiology",
                "Dermatology",
                "General Medicine",
                "Neurology",
                "Orthopedics",
                "Pediatrics",
            ])
    }

    pub fn with_departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.departments.extend(departments.into_iter().map(Into::into));
        self
    }

    pub fn with_doctor(mut self, doctor: Doctor) -> Self {
        if !self.departments.iter().any(|d| d == &doctor.department) {
            self.departments.push(doctor.department.clone());
        }
        self.doctors.push(doctor);
        self
    }

    pub fn with_patient(mut self, patient: Patient) -> Self {
        self.patients.push(patient);
        self
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDirectory {
    async fn list_departments(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.departments.clone())
    }

    async fn list_doctors_by_department(&self, department: &str) -> Result<Vec<Doctor>, StoreError> {
        Ok(self
            .doctors
            .iter()
            .filter(|d| d.department.eq_ignore_ascii_case(department))
            .cloned()
            .collect())
    }

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        Ok(self.doctors.iter().find(|d| d.id == id).cloned())
    }
}

#[async_trait]
impl PatientDirectory for InMemoryDirectory {
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self
            .patients
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }
}

#[derive(Debug, serde::Deserialize)]
struct DepartmentRow {
    name: String,
}

/// Reads the `departments`, `doctors` and `patients` tables.
pub struct SupabaseDirectory {
    supabase: SupabaseClient,
}

impl SupabaseDirectory {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDirectory {
    async fn list_departments(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<DepartmentRow> = self
            .supabase
            .request(Method::GET, "/rest/v1/departments?select=name&order=name.asc", None, None)
            .await?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    async fn list_doctors_by_department(&self, department: &str) -> Result<Vec<Doctor>, StoreError> {
        let path = format!(
            "/rest/v1/doctors?department=eq.{}&select=id,name,department&order=name.asc",
            urlencoding::encode(department)
        );
        debug!("Listing doctors for department {}", department);
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id,name,department", id);
        let rows: Vec<Doctor> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PatientDirectory for SupabaseDirectory {
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let path = format!(
            "/rest/v1/patients?email=eq.{}&select=id,name,email",
            urlencoding::encode(&email.trim().to_lowercase())
        );
        let rows: Vec<Patient> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }
}
