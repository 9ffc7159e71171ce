#![allow(dead_code)]

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, BookAppointmentRequest, Doctor, Patient};
use appointment_cell::services::{AppointmentLifecycleService, Clock, InMemoryDirectory, LifecycleRules, ManualClock};
use notification_cell::{
    AppointmentFeed, InMemoryReadState, LifecycleFeed, NotificationCenter, ReadStateBackend, ReadStateTracker, Viewer,
};

/// A clinic with one cardiologist, one registered patient and a clock frozen
/// at 2030-05-10 09:00 UTC.
pub struct Clinic {
    pub service: Arc<AppointmentLifecycleService>,
    pub clock: Arc<ManualClock>,
    pub read_state: Arc<dyn ReadStateBackend>,
    pub cardiologist: Doctor,
    pub patient: Patient,
}

impl Clinic {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2030, 5, 10, 9, 0, 0).unwrap()));
        let cardiologist = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Gregory House".to_string(),
            department: "Cardiology".to_string(),
        };
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
        };

        let directory = InMemoryDirectory::seeded()
            .with_doctor(cardiologist.clone())
            .with_patient(patient.clone());
        let service = AppointmentLifecycleService::in_memory(directory, clock.clone(), LifecycleRules::default());

        Self {
            service: Arc::new(service),
            clock,
            read_state: Arc::new(InMemoryReadState::new()),
            cardiologist,
            patient,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today(utc())
    }

    pub fn feed(&self) -> Arc<dyn AppointmentFeed> {
        Arc::new(LifecycleFeed::new(self.service.clone()))
    }

    pub fn doctor_viewer(&self) -> Viewer {
        Viewer::Doctor {
            doctor_id: self.cardiologist.id,
        }
    }

    pub fn center(&self, viewer: Viewer, scope: &str) -> NotificationCenter {
        self.center_with_feed(viewer, scope, self.feed())
    }

    pub fn center_with_feed(&self, viewer: Viewer, scope: &str, feed: Arc<dyn AppointmentFeed>) -> NotificationCenter {
        NotificationCenter::new(
            viewer,
            feed,
            ReadStateTracker::new(self.read_state.clone(), scope),
            self.clock.clone(),
            utc(),
        )
    }

    pub async fn book(&self, department: &str, doctor_id: Option<Uuid>, date: NaiveDate) -> Appointment {
        self.service
            .book_appointment(BookAppointmentRequest {
                patient_name: self.patient.name.clone(),
                department: department.to_string(),
                appointment_date: date,
                patient_email: self.patient.email.clone(),
                doctor_id,
                appointment_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
                patient_phone: "+44 20 7946 0000".to_string(),
                patient_gender: None,
            })
            .await
            .unwrap()
    }
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}
