use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

use appointment_cell::models::Appointment;

use crate::{Notification, NotificationKey, NotificationKind, NotificationSet};

/// How long a booking counts as a new request.
pub const NEW_REQUEST_WINDOW_HOURS: i64 = 24;

/// When the booking arrived: `created_at`, or the start of the appointment
/// day in the clinic's offset for rows that never recorded it.
fn arrival(appointment: &Appointment, offset: FixedOffset) -> Option<DateTime<Utc>> {
    appointment.created_at.or_else(|| {
        offset
            .from_local_datetime(&appointment.appointment_date.and_time(NaiveTime::MIN))
            .single()
            .map(|local| local.with_timezone(&Utc))
    })
}

/// Recomputes both notification lists from scratch. Pure: the same inputs
/// always give the same set.
pub fn project(
    appointments: &[Appointment],
    read: &HashSet<NotificationKey>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> NotificationSet {
    let today = now.with_timezone(&offset).date_naive();
    let window = Duration::hours(NEW_REQUEST_WINDOW_HOURS);
    let is_recent = |at: DateTime<Utc>| {
        let elapsed = now - at;
        elapsed >= Duration::zero() && elapsed < window
    };

    let mut new_requests: Vec<Notification> = appointments
        .iter()
        .filter(|a| arrival(a, offset).is_some_and(|at| is_recent(at)))
        .filter(|a| !read.contains(&NotificationKey::NewRequest(a.id)))
        .map(|a| Notification::from_appointment(a, NotificationKind::New))
        .collect();

    let mut today_list: Vec<Notification> = appointments
        .iter()
        .filter(|a| a.appointment_date == today)
        .filter(|a| !read.contains(&NotificationKey::Today(a.id)))
        .map(|a| Notification::from_appointment(a, NotificationKind::Today))
        .collect();

    new_requests.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.appointment_id.cmp(&b.appointment_id))
    });
    today_list.sort_by(|a, b| {
        a.appointment_time
            .cmp(&b.appointment_time)
            .then_with(|| a.appointment_id.cmp(&b.appointment_id))
    });

    NotificationSet {
        new_requests,
        today: today_list,
    }
}
