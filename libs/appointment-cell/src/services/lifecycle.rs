// libs/appointment-cell/src/services/lifecycle.rs
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentHistoryRecord, AppointmentStatus,
    BookAppointmentRequest, Doctor, EditAppointmentRequest, HistoryInput,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::directory::{DoctorDirectory, InMemoryDirectory, PatientDirectory, SupabaseDirectory};
use crate::services::store::{AppointmentStore, HistoryStore, InMemoryStore, StoreError};
use crate::services::supabase_store::SupabaseStore;

/// Whether `update_status` enforces the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Only state-machine edges; terminal states stay terminal.
    Strict,
    /// Any status may be written.
    Permissive,
}

/// What recording a visit does to a cancelled appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// The first history record closes the case, whatever the prior status.
    Always,
    /// Cancelled appointments cannot receive history.
    RejectCancelled,
}

impl FromStr for CompletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(CompletionPolicy::Always),
            "reject_cancelled" => Ok(CompletionPolicy::RejectCancelled),
            other => Err(format!("unknown completion policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleRules {
    pub transition_policy: TransitionPolicy,
    pub completion_policy: CompletionPolicy,
    pub clinic_offset: FixedOffset,
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::Strict,
            completion_policy: CompletionPolicy::Always,
            clinic_offset: utc(),
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl LifecycleRules {
    pub fn from_config(config: &AppConfig) -> Self {
        let completion_policy = config
            .history_completion_policy
            .parse()
            .unwrap_or_else(|e| {
                warn!("{}, falling back to 'always'", e);
                CompletionPolicy::Always
            });

        let clinic_offset = config
            .clinic_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!(
                    "CLINIC_UTC_OFFSET_MINUTES {} out of range, using UTC",
                    config.clinic_utc_offset_minutes
                );
                utc()
            });

        Self {
            transition_policy: if config.strict_status_transitions {
                TransitionPolicy::Strict
            } else {
                TransitionPolicy::Permissive
            },
            completion_policy,
            clinic_offset,
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| unreachable!("email pattern: {}", e))
    })
}

fn required(field: &str, value: &str) -> Result<String, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// The only component allowed to mutate appointment status. Every check runs
/// before the store is touched, so a rejected call leaves no trace.
pub struct AppointmentLifecycleService {
    appointments: Arc<dyn AppointmentStore>,
    history: Arc<dyn HistoryStore>,
    doctors: Arc<dyn DoctorDirectory>,
    patients: Arc<dyn PatientDirectory>,
    clock: Arc<dyn Clock>,
    rules: LifecycleRules,
}

impl AppointmentLifecycleService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        history: Arc<dyn HistoryStore>,
        doctors: Arc<dyn DoctorDirectory>,
        patients: Arc<dyn PatientDirectory>,
        clock: Arc<dyn Clock>,
        rules: LifecycleRules,
    ) -> Self {
        Self {
            appointments,
            history,
            doctors,
            patients,
            clock,
            rules,
        }
    }

    /// Shares one in-memory store between the appointment and history seams.
    pub fn in_memory(directory: InMemoryDirectory, clock: Arc<dyn Clock>, rules: LifecycleRules) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let directory = Arc::new(directory);

        Self::new(store.clone(), store, directory.clone(), directory, clock, rules)
    }

    /// Supabase when configured, otherwise in-memory with the seeded directory.
    pub fn from_config(config: &AppConfig) -> Self {
        let rules = LifecycleRules::from_config(config);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        if config.is_configured() {
            info!("Using Supabase appointment store at {}", config.supabase_url);
            let supabase = SupabaseClient::new(config);
            let store = Arc::new(SupabaseStore::new(supabase.clone()));
            let directory = Arc::new(SupabaseDirectory::new(supabase));
            Self::new(store.clone(), store, directory.clone(), directory, clock, rules)
        } else {
            info!("Using in-memory appointment store");
            Self::in_memory(InMemoryDirectory::seeded(), clock, rules)
        }
    }

    pub fn rules(&self) -> &LifecycleRules {
        &self.rules
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn today(&self) -> NaiveDate {
        self.clock.today(self.rules.clinic_offset)
    }

    fn ensure_not_past(&self, date: NaiveDate) -> Result<(), AppointmentError> {
        let today = self.today();
        if date < today {
            warn!("Rejected appointment date {} (today is {})", date, today);
            return Err(AppointmentError::ValidationError(format!(
                "Appointment date {} is in the past",
                date
            )));
        }
        Ok(())
    }

    async fn resolve_department(&self, department: &str) -> Result<String, AppointmentError> {
        let known = self.doctors.list_departments().await?;
        known
            .into_iter()
            .find(|d| d.eq_ignore_ascii_case(department))
            .ok_or_else(|| AppointmentError::ValidationError(format!("Unknown department '{}'", department)))
    }

    async fn resolve_doctor(
        &self,
        doctor_id: Option<Uuid>,
        department: &str,
    ) -> Result<Option<Doctor>, AppointmentError> {
        let Some(doctor_id) = doctor_id else {
            return Ok(None);
        };

        let doctor = self
            .doctors
            .find_doctor(doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        if !doctor.department.eq_ignore_ascii_case(department) {
            return Err(AppointmentError::ValidationError(format!(
                "{} does not work in {}",
                doctor.name, department
            )));
        }

        Ok(Some(doctor))
    }

    async fn load(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get_by_id(id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    pub async fn book_appointment(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let patient_name = required("patient_name", &request.patient_name)?;
        let patient_email = required("patient_email", &request.patient_email)?.to_lowercase();
        let patient_phone = required("patient_phone", &request.patient_phone)?;
        let department = required("department", &request.department)?;

        if !email_pattern().is_match(&patient_email) {
            return Err(AppointmentError::ValidationError(format!(
                "'{}' is not a valid email address",
                patient_email
            )));
        }

        self.ensure_not_past(request.appointment_date)?;
        let department = self.resolve_department(&department).await?;
        let doctor = self.resolve_doctor(request.doctor_id, &department).await?;

        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_name,
            patient_email,
            patient_phone,
            patient_gender: request
                .patient_gender
                .map(|g| g.trim().to_lowercase())
                .unwrap_or_default(),
            department,
            doctor_id: doctor.as_ref().map(|d| d.id),
            doctor_name: doctor.map(|d| d.name),
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            status: AppointmentStatus::Pending,
            created_at: Some(now),
            updated_at: Some(now),
        };

        let created = self.appointments.create(appointment).await?;
        info!(
            "Booked appointment {} in {} on {} {}",
            created.id, created.department, created.appointment_date, created.appointment_time
        );
        Ok(created)
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.load(id).await
    }

    pub async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = if *filter == AppointmentFilter::default() {
            self.appointments.list_all().await?
        } else {
            self.appointments.list_by_filter(filter).await?
        };
        debug!("Listed {} appointments", appointments.len());
        Ok(appointments)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;

        if current.status == new_status {
            debug!("Appointment {} already {}", id, new_status);
            return Ok(current);
        }

        if self.rules.transition_policy == TransitionPolicy::Strict
            && !current.status.can_transition_to(new_status)
        {
            warn!("Invalid status transition attempted on {}: {} -> {}", id, current.status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current.status,
                to: new_status,
            });
        }

        let updated = self
            .appointments
            .update_status(id, new_status, self.clock.now())
            .await?;
        info!("Appointment {} moved {} -> {}", id, current.status, new_status);
        Ok(updated)
    }

    pub async fn edit_appointment(
        &self,
        id: Uuid,
        request: EditAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_name = required("patient_name", &request.patient_name)?;
        let department = required("department", &request.department)?;
        self.ensure_not_past(request.appointment_date)?;

        let current = self.load(id).await?;
        let department = self.resolve_department(&department).await?;
        let doctor = self.resolve_doctor(request.doctor_id, &department).await?;

        let edited = Appointment {
            patient_name,
            department,
            doctor_id: doctor.as_ref().map(|d| d.id),
            doctor_name: doctor.map(|d| d.name),
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            status: request.status,
            updated_at: Some(self.clock.now()),
            ..current
        };

        let saved = self.appointments.update(edited).await?;
        info!("Appointment {} edited by administrator", id);
        Ok(saved)
    }

    pub async fn delete_appointment(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.appointments.delete(id).await?;
        info!("Appointment {} deleted", id);
        Ok(())
    }

    // ==========================================================================
    // HISTORY
    // ==========================================================================

    fn validate_history(input: &HistoryInput) -> Result<(), AppointmentError> {
        if let Some(position) = input.medicine.iter().position(|m| m.name.trim().is_empty()) {
            return Err(AppointmentError::ValidationError(format!(
                "medicine[{}].name is required",
                position
            )));
        }
        Ok(())
    }

    /// Records a visit outcome and completes the appointment.
    pub async fn add_history(
        &self,
        appointment_id: Uuid,
        input: HistoryInput,
    ) -> Result<AppointmentHistoryRecord, AppointmentError> {
        Self::validate_history(&input)?;

        let appointment = self.load(appointment_id).await?;
        let patient = self
            .patients
            .find_patient_by_email(&appointment.patient_email)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;

        if appointment.status == AppointmentStatus::Cancelled {
            match self.rules.completion_policy {
                CompletionPolicy::RejectCancelled => {
                    return Err(AppointmentError::ValidationError(
                        "Cannot record a visit for a cancelled appointment".to_string(),
                    ));
                }
                CompletionPolicy::Always => {
                    warn!("Recording visit on cancelled appointment {}; it will be completed", appointment_id);
                }
            }
        }

        let record = AppointmentHistoryRecord {
            id: Uuid::new_v4(),
            appointment_id,
            patient_id: patient.id,
            diagnosis: input.diagnosis,
            prescription: input.prescription,
            medicine: input.medicine,
            next_appointment: input.next_appointment,
            created_at: self.clock.now(),
        };

        let stored = self.history.record_visit(record).await?;
        info!(
            "Visit {} recorded for appointment {} ({} -> completed)",
            stored.id, appointment_id, appointment.status
        );
        Ok(stored)
    }

    pub async fn list_history(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, AppointmentError> {
        self.load(appointment_id).await?;
        Ok(self.history.list_by_appointment(appointment_id).await?)
    }

    pub async fn list_patient_history(&self, patient_id: Uuid) -> Result<Vec<AppointmentHistoryRecord>, AppointmentError> {
        Ok(self.history.list_by_patient(patient_id).await?)
    }

    /// Administrative correction of a record's clinical fields.
    pub async fn update_history(
        &self,
        history_id: Uuid,
        input: HistoryInput,
    ) -> Result<AppointmentHistoryRecord, AppointmentError> {
        Self::validate_history(&input)?;

        let current = self
            .history
            .get_by_id(history_id)
            .await?
            .ok_or(AppointmentError::HistoryNotFound)?;

        let updated = AppointmentHistoryRecord {
            diagnosis: input.diagnosis,
            prescription: input.prescription,
            medicine: input.medicine,
            next_appointment: input.next_appointment,
            ..current
        };

        Ok(self.history.update(updated).await?)
    }

    pub async fn delete_history(&self, history_id: Uuid) -> Result<(), AppointmentError> {
        self.history.delete(history_id).await.map_err(|e| match e {
            StoreError::NotFound => AppointmentError::HistoryNotFound,
            other => other.into(),
        })?;
        info!("History record {} deleted", history_id);
        Ok(())
    }

    // ==========================================================================
    // DIRECTORY PASS-THROUGH
    // ==========================================================================

    pub async fn list_departments(&self) -> Result<Vec<String>, AppointmentError> {
        Ok(self.doctors.list_departments().await?)
    }

    pub async fn list_doctors_by_department(&self, department: &str) -> Result<Vec<Doctor>, AppointmentError> {
        Ok(self.doctors.list_doctors_by_department(department).await?)
    }
}
