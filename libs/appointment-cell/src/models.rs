// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A booking request and its current lifecycle status. Patient fields are a
/// snapshot taken at booking time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    #[serde(default)]
    pub patient_gender: String,
    pub department: String,
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    pub appointment_date: NaiveDate,
    #[serde(with = "flexible_time")]
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    // Legacy rows predate this column.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    /// Edges of the state machine. Administrative edits bypass this.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Pending, Completed)
                | (Accepted, Cancelled)
                | (Accepted, Completed)
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Accepted => write!(f, "accepted"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "accepted" => Ok(AppointmentStatus::Accepted),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(AppointmentError::ValidationError(format!(
                "Unknown appointment status '{}'",
                other
            ))),
        }
    }
}

// ==============================================================================
// HISTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NextAppointment {
    pub date: NaiveDate,
    #[serde(default, with = "flexible_time::option")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Clinical outcome of a visit, attached to exactly one appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentHistoryRecord {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,
    #[serde(default)]
    pub medicine: Vec<Medicine>,
    #[serde(default)]
    pub next_appointment: Option<NextAppointment>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_name: String,
    pub department: String,
    pub appointment_date: NaiveDate,
    pub patient_email: String,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(with = "flexible_time")]
    pub appointment_time: NaiveTime,
    pub patient_phone: String,
    #[serde(default)]
    pub patient_gender: Option<String>,
}

/// Administrative resubmission of an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditAppointmentRequest {
    pub patient_name: String,
    pub department: String,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    #[serde(with = "flexible_time")]
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryInput {
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,
    #[serde(default)]
    pub medicine: Vec<Medicine>,
    #[serde(default)]
    pub next_appointment: Option<NextAppointment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentFilter {
    pub patient_email: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub doctor_name: Option<String>,
    pub department: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn for_patient(email: impl Into<String>) -> Self {
        Self {
            patient_email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn for_doctor(doctor_id: Uuid) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        let email_ok = self
            .patient_email
            .as_deref()
            .map_or(true, |email| appointment.patient_email.eq_ignore_ascii_case(email.trim()));
        let doctor_ok = self
            .doctor_id
            .map_or(true, |id| appointment.doctor_id == Some(id));
        let doctor_name_ok = self.doctor_name.as_deref().map_or(true, |name| {
            appointment.doctor_name.as_deref() == Some(name)
        });
        let department_ok = self
            .department
            .as_deref()
            .map_or(true, |department| appointment.department == department);
        let status_ok = self.status.map_or(true, |status| appointment.status == status);

        email_ok && doctor_ok && doctor_name_ok && department_ok && status_ok
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("History record not found")]
    HistoryNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Persistence error: {0}")]
    Io(String),
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound
            | AppointmentError::HistoryNotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::DoctorNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(e.to_string()),
            AppointmentError::Io(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// SERDE HELPERS
// ==============================================================================

/// Accepts `HH:MM` (HTML time inputs) as well as `HH:MM:SS`.
pub mod flexible_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const OUTPUT_FORMAT: &str = "%H:%M:%S";

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(OUTPUT_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}'", raw)))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}'", raw))),
            }
        }
    }
}
