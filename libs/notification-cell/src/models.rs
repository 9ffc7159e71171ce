use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::models::{flexible_time, Appointment, AppointmentFilter, AppointmentStatus};
use shared_models::auth::{Role, User};

use crate::NotificationError;

const TODAY_PREFIX: &str = "today-";

// ==============================================================================
// KEYS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A booking created within the last day.
    New,
    /// An appointment scheduled for the current clinic date.
    Today,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::New => write!(f, "new"),
            NotificationKind::Today => write!(f, "today"),
        }
    }
}

/// Acknowledgement key. The string forms `<id>` and `today-<id>` are what the
/// read-state backends persist, so "new" and "today" are dismissed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKey {
    NewRequest(Uuid),
    Today(Uuid),
}

impl NotificationKey {
    pub fn new(appointment_id: Uuid, kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::New => NotificationKey::NewRequest(appointment_id),
            NotificationKind::Today => NotificationKey::Today(appointment_id),
        }
    }

    pub fn appointment_id(&self) -> Uuid {
        match self {
            NotificationKey::NewRequest(id) | NotificationKey::Today(id) => *id,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationKey::NewRequest(_) => NotificationKind::New,
            NotificationKey::Today(_) => NotificationKind::Today,
        }
    }
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKey::NewRequest(id) => write!(f, "{}", id),
            NotificationKey::Today(id) => write!(f, "{}{}", TODAY_PREFIX, id),
        }
    }
}

impl FromStr for NotificationKey {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NotificationError::InvalidKey(s.to_string());
        match s.strip_prefix(TODAY_PREFIX) {
            Some(id) => Uuid::parse_str(id).map(NotificationKey::Today).map_err(|_| invalid()),
            None => Uuid::parse_str(s).map(NotificationKey::NewRequest).map_err(|_| invalid()),
        }
    }
}

impl Serialize for NotificationKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NotificationKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// NOTIFICATIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub key: NotificationKey,
    pub appointment_id: Uuid,
    pub kind: NotificationKind,
    pub patient_name: String,
    pub department: String,
    pub doctor_name: Option<String>,
    pub appointment_date: NaiveDate,
    #[serde(with = "flexible_time")]
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn from_appointment(appointment: &Appointment, kind: NotificationKind) -> Self {
        Self {
            key: NotificationKey::new(appointment.id, kind),
            appointment_id: appointment.id,
            kind,
            patient_name: appointment.patient_name.clone(),
            department: appointment.department.clone(),
            doctor_name: appointment.doctor_name.clone(),
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            status: appointment.status,
            created_at: appointment.created_at,
        }
    }
}

/// One full recomputation for a viewer. The two lists are independent and
/// may mention the same appointment under different keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationSet {
    pub new_requests: Vec<Notification>,
    pub today: Vec<Notification>,
}

impl NotificationSet {
    pub fn is_empty(&self) -> bool {
        self.new_requests.is_empty() && self.today.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new_requests.len() + self.today.len()
    }

    pub fn keys(&self) -> Vec<NotificationKey> {
        self.new_requests
            .iter()
            .chain(self.today.iter())
            .map(|n| n.key)
            .collect()
    }

    /// Drops the entry for `key`; returns whether one was present.
    pub fn remove(&mut self, key: &NotificationKey) -> bool {
        let list = match key.kind() {
            NotificationKind::New => &mut self.new_requests,
            NotificationKind::Today => &mut self.today,
        };
        let before = list.len();
        list.retain(|n| n.key != *key);
        list.len() != before
    }

    pub fn mentions(&self, appointment_id: Uuid) -> usize {
        self.new_requests
            .iter()
            .chain(self.today.iter())
            .filter(|n| n.appointment_id == appointment_id)
            .count()
    }
}

// ==============================================================================
// VIEWER
// ==============================================================================

/// Whose appointments a dashboard watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Doctor { doctor_id: Uuid },
    Patient { email: String },
    Admin,
}

impl Viewer {
    pub fn from_user(user: &User) -> Result<Self, NotificationError> {
        match user.role {
            Role::Doctor => Uuid::parse_str(&user.id)
                .map(|doctor_id| Viewer::Doctor { doctor_id })
                .map_err(|_| NotificationError::InvalidViewer(format!("doctor id '{}' is not a UUID", user.id))),
            Role::Patient => user
                .email
                .as_deref()
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(|email| Viewer::Patient {
                    email: email.to_lowercase(),
                })
                .ok_or_else(|| NotificationError::InvalidViewer("patient token carries no email".to_string())),
            Role::Admin => Ok(Viewer::Admin),
        }
    }

    pub fn filter(&self) -> AppointmentFilter {
        match self {
            Viewer::Doctor { doctor_id } => AppointmentFilter::for_doctor(*doctor_id),
            Viewer::Patient { email } => AppointmentFilter::for_patient(email.clone()),
            Viewer::Admin => AppointmentFilter::default(),
        }
    }
}

impl fmt::Display for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Viewer::Doctor { doctor_id } => write!(f, "doctor:{}", doctor_id),
            Viewer::Patient { email } => write!(f, "patient:{}", email),
            Viewer::Admin => write!(f, "admin"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub appointment_id: Uuid,
    pub kind: NotificationKind,
}

/// Keys the client is displaying, in their `<id>` / `today-<id>` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAllReadRequest {
    pub keys: Vec<NotificationKey>,
}
