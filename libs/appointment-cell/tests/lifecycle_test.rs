use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::*;
use appointment_cell::services::{
    AppointmentLifecycleService, Clock, CompletionPolicy, InMemoryDirectory, LifecycleRules,
    ManualClock, TransitionPolicy,
};

struct Fixture {
    service: AppointmentLifecycleService,
    clock: Arc<ManualClock>,
    cardiologist: Doctor,
    patient: Patient,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fixture_with(rules: LifecycleRules) -> Fixture {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2030, 5, 10, 9, 0, 0).unwrap()));
    let cardiologist = Doctor {
        id: Uuid::new_v4(),
        name: "Dr. Gregory House".to_string(),
        department: "Cardiology".to_string(),
    };
    let neurologist = Doctor {
        id: Uuid::new_v4(),
        name: "Dr. Stephen Strange".to_string(),
        department: "Neurology".to_string(),
    };
    let patient = Patient {
        id: Uuid::new_v4(),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
    };

    let directory = InMemoryDirectory::new()
        .with_doctor(cardiologist.clone())
        .with_doctor(neurologist)
        .with_patient(patient.clone());

    Fixture {
        service: AppointmentLifecycleService::in_memory(directory, clock.clone(), rules),
        clock,
        cardiologist,
        patient,
    }
}

fn fixture() -> Fixture {
    fixture_with(LifecycleRules::default())
}

fn booking(department: &str, doctor_id: Option<Uuid>, on: NaiveDate) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_name: "Ada Lovelace".to_string(),
        department: department.to_string(),
        appointment_date: on,
        patient_email: "Ada@Example.com".to_string(),
        doctor_id,
        appointment_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        patient_phone: "+44 20 7946 0000".to_string(),
        patient_gender: Some("Female".to_string()),
    }
}

fn visit(diagnosis: &str) -> HistoryInput {
    HistoryInput {
        diagnosis: Some(diagnosis.to_string()),
        prescription: Some("Rest".to_string()),
        medicine: vec![Medicine {
            name: "Aspirin".to_string(),
            dosage: "75mg".to_string(),
            frequency: "daily".to_string(),
            duration: "14 days".to_string(),
        }],
        next_appointment: None,
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn booking_creates_pending_snapshot() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("cardiology", Some(f.cardiologist.id), date(2030, 5, 12)))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.department, "Cardiology");
    assert_eq!(appointment.patient_email, "ada@example.com");
    assert_eq!(appointment.patient_gender, "female");
    assert_eq!(appointment.doctor_name.as_deref(), Some("Dr. Gregory House"));
    assert_eq!(appointment.created_at, Some(f.clock.now()));

    let for_doctor = f
        .service
        .list_appointments(&AppointmentFilter::for_doctor(f.cardiologist.id))
        .await
        .unwrap();
    assert_eq!(for_doctor, vec![appointment.clone()]);

    let everything = f.service.list_appointments(&AppointmentFilter::default()).await.unwrap();
    assert_eq!(everything, vec![appointment]);
}

#[tokio::test]
async fn booking_without_doctor_then_accept() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("Neurology", None, date(2030, 5, 11)))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert!(appointment.doctor_id.is_none());

    f.service
        .update_status(appointment.id, AppointmentStatus::Accepted)
        .await
        .unwrap();

    let reloaded = f.service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Accepted);
    assert_eq!(reloaded.patient_name, appointment.patient_name);
    assert_eq!(reloaded.appointment_date, appointment.appointment_date);
}

#[tokio::test]
async fn booking_validation_rejects_without_writing() {
    let f = fixture();

    let past = f.service.book_appointment(booking("Cardiology", None, date(2030, 5, 9))).await;
    assert_matches!(past, Err(AppointmentError::ValidationError(_)));

    let unknown_department = f.service.book_appointment(booking("Astrology", None, date(2030, 5, 12))).await;
    assert_matches!(unknown_department, Err(AppointmentError::ValidationError(_)));

    let unknown_doctor = f
        .service
        .book_appointment(booking("Cardiology", Some(Uuid::new_v4()), date(2030, 5, 12)))
        .await;
    assert_matches!(unknown_doctor, Err(AppointmentError::DoctorNotFound));

    let wrong_department = f
        .service
        .book_appointment(booking("Neurology", Some(f.cardiologist.id), date(2030, 5, 12)))
        .await;
    assert_matches!(wrong_department, Err(AppointmentError::ValidationError(_)));

    let mut missing_name = booking("Cardiology", None, date(2030, 5, 12));
    missing_name.patient_name = "   ".to_string();
    assert_matches!(
        f.service.book_appointment(missing_name).await,
        Err(AppointmentError::ValidationError(msg)) if msg.contains("patient_name")
    );

    let mut bad_email = booking("Cardiology", None, date(2030, 5, 12));
    bad_email.patient_email = "ada-at-example".to_string();
    assert_matches!(f.service.book_appointment(bad_email).await, Err(AppointmentError::ValidationError(_)));

    let stored = f.service.list_appointments(&AppointmentFilter::default()).await.unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn booking_for_today_is_allowed() {
    let f = fixture();
    let appointment = f.service.book_appointment(booking("Cardiology", None, date(2030, 5, 10))).await;
    assert!(appointment.is_ok());
}

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

#[tokio::test]
async fn update_status_unknown_id_has_no_side_effect() {
    let f = fixture();
    let existing = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();
    let before = f.service.list_appointments(&AppointmentFilter::default()).await.unwrap();

    let result = f.service.update_status(Uuid::new_v4(), AppointmentStatus::Accepted).await;
    assert_matches!(result, Err(AppointmentError::NotFound));

    let after = f.service.list_appointments(&AppointmentFilter::default()).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after[0].id, existing.id);
}

#[tokio::test]
async fn strict_policy_keeps_terminal_states_terminal() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();

    f.service
        .update_status(appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    let revert = f.service.update_status(appointment.id, AppointmentStatus::Pending).await;
    assert_matches!(
        revert,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Pending
        })
    );

    let reloaded = f.service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Cancelled);

    // Re-applying the current status is accepted as a no-op.
    let same = f.service.update_status(appointment.id, AppointmentStatus::Cancelled).await.unwrap();
    assert_eq!(same, reloaded);
}

#[tokio::test]
async fn permissive_policy_writes_any_status() {
    let f = fixture_with(LifecycleRules {
        transition_policy: TransitionPolicy::Permissive,
        ..LifecycleRules::default()
    });
    let appointment = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();

    f.service.update_status(appointment.id, AppointmentStatus::Completed).await.unwrap();
    let reverted = f.service.update_status(appointment.id, AppointmentStatus::Pending).await.unwrap();
    assert_eq!(reverted.status, AppointmentStatus::Pending);
}

// ==============================================================================
// ADMINISTRATIVE EDIT / DELETE
// ==============================================================================

#[tokio::test]
async fn edit_to_past_date_fails_and_leaves_record_untouched() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();

    // The appointment's own date slips into the past.
    f.clock.advance(Duration::days(5));
    let before = f.service.get_appointment(appointment.id).await.unwrap();

    let result = f
        .service
        .edit_appointment(
            appointment.id,
            EditAppointmentRequest {
                patient_name: "Ada King".to_string(),
                department: "Cardiology".to_string(),
                doctor_id: None,
                appointment_date: date(2030, 5, 12),
                appointment_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                status: AppointmentStatus::Accepted,
            },
        )
        .await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
    let after = f.service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn edit_replaces_editable_fields_only() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("Neurology", None, date(2030, 5, 12)))
        .await
        .unwrap();
    f.service.update_status(appointment.id, AppointmentStatus::Cancelled).await.unwrap();

    let edited = f
        .service
        .edit_appointment(
            appointment.id,
            EditAppointmentRequest {
                patient_name: "Ada King".to_string(),
                department: "Cardiology".to_string(),
                doctor_id: Some(f.cardiologist.id),
                appointment_date: date(2030, 5, 20),
                appointment_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                status: AppointmentStatus::Pending,
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.patient_name, "Ada King");
    assert_eq!(edited.department, "Cardiology");
    assert_eq!(edited.doctor_id, Some(f.cardiologist.id));
    assert_eq!(edited.doctor_name.as_deref(), Some("Dr. Gregory House"));
    assert_eq!(edited.status, AppointmentStatus::Pending);
    assert_eq!(edited.patient_email, appointment.patient_email);
    assert_eq!(edited.created_at, appointment.created_at);
}

#[tokio::test]
async fn delete_cascades_history() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();
    f.service.add_history(appointment.id, visit("Angina")).await.unwrap();
    f.clock.advance(Duration::minutes(30));
    f.service.add_history(appointment.id, visit("Angina, stable")).await.unwrap();

    f.service.delete_appointment(appointment.id).await.unwrap();

    let remaining = f.service.list_appointments(&AppointmentFilter::default()).await.unwrap();
    assert!(remaining.iter().all(|a| a.id != appointment.id));
    assert!(f.service.list_patient_history(f.patient.id).await.unwrap().is_empty());
    assert_matches!(f.service.list_history(appointment.id).await, Err(AppointmentError::NotFound));
    assert_matches!(f.service.delete_appointment(appointment.id).await, Err(AppointmentError::NotFound));
}

// ==============================================================================
// HISTORY
// ==============================================================================

#[tokio::test]
async fn history_completes_from_every_prior_status() {
    for prior in [
        AppointmentStatus::Pending,
        AppointmentStatus::Accepted,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ] {
        let f = fixture_with(LifecycleRules {
            transition_policy: TransitionPolicy::Permissive,
            ..LifecycleRules::default()
        });
        let appointment = f
            .service
            .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
            .await
            .unwrap();
        f.service.update_status(appointment.id, prior).await.unwrap();

        let record = f.service.add_history(appointment.id, visit("Checked")).await.unwrap();
        assert_eq!(record.patient_id, f.patient.id);

        let reloaded = f.service.get_appointment(appointment.id).await.unwrap();
        assert_eq!(reloaded.status, AppointmentStatus::Completed, "prior status {}", prior);
    }
}

#[tokio::test]
async fn reject_cancelled_policy_blocks_history() {
    let f = fixture_with(LifecycleRules {
        completion_policy: CompletionPolicy::RejectCancelled,
        ..LifecycleRules::default()
    });
    let appointment = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();
    f.service.update_status(appointment.id, AppointmentStatus::Cancelled).await.unwrap();

    let result = f.service.add_history(appointment.id, visit("Too late")).await;
    assert_matches!(result, Err(AppointmentError::ValidationError(_)));

    assert!(f.service.list_history(appointment.id).await.unwrap().is_empty());
    let reloaded = f.service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn history_requires_registered_patient() {
    let f = fixture();
    let mut request = booking("Cardiology", None, date(2030, 5, 12));
    request.patient_email = "walk-in@example.com".to_string();
    let appointment = f.service.book_appointment(request).await.unwrap();

    let result = f.service.add_history(appointment.id, visit("Flu")).await;
    assert_matches!(result, Err(AppointmentError::PatientNotFound));

    let reloaded = f.service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Pending);
    assert!(f.service.list_history(appointment.id).await.unwrap().is_empty());

    assert_matches!(
        f.service.add_history(Uuid::new_v4(), visit("Flu")).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn history_lists_newest_first_and_supports_admin_overrides() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();

    let first = f.service.add_history(appointment.id, visit("First visit")).await.unwrap();
    f.clock.advance(Duration::days(1));
    let second = f.service.add_history(appointment.id, HistoryInput::default()).await.unwrap();
    assert!(second.medicine.is_empty());
    assert!(second.next_appointment.is_none());

    let listed = f.service.list_history(appointment.id).await.unwrap();
    assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);

    let corrected = f
        .service
        .update_history(first.id, visit("Corrected diagnosis"))
        .await
        .unwrap();
    assert_eq!(corrected.diagnosis.as_deref(), Some("Corrected diagnosis"));
    assert_eq!(corrected.created_at, first.created_at);
    assert_eq!(corrected.appointment_id, appointment.id);

    f.service.delete_history(second.id).await.unwrap();
    assert_eq!(f.service.list_patient_history(f.patient.id).await.unwrap(), vec![corrected]);

    assert_matches!(f.service.delete_history(second.id).await, Err(AppointmentError::HistoryNotFound));
    assert_matches!(
        f.service.update_history(Uuid::new_v4(), visit("x")).await,
        Err(AppointmentError::HistoryNotFound)
    );
}

#[tokio::test]
async fn history_rejects_unnamed_medicine() {
    let f = fixture();
    let appointment = f
        .service
        .book_appointment(booking("Cardiology", None, date(2030, 5, 12)))
        .await
        .unwrap();

    let mut input = visit("Cough");
    input.medicine.push(Medicine {
        name: " ".to_string(),
        dosage: "5ml".to_string(),
        frequency: String::new(),
        duration: String::new(),
    });

    assert_matches!(
        f.service.add_history(appointment.id, input).await,
        Err(AppointmentError::ValidationError(msg)) if msg.contains("medicine[1]")
    );
    let reloaded = f.service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Pending);
}
