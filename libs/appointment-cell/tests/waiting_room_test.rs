use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus, AppointmentType};
use appointment_cell::services::waiting_room::WaitingRoomService;
use appointment_cell::store::InMemoryAppointmentStore;

fn record(
    doctor_id: Uuid,
    status: AppointmentStatus,
    joined: Option<DateTime<Utc>>,
) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id,
        appointment_type: AppointmentType::Instant,
        scheduled_time: now,
        status,
        is_paid: false,
        payment_id: None,
        waiting_room_joined_at: joined,
        symptoms: vec![],
        created_at: now,
        updated_at: now,
    }
}

async fn service_with(records: Vec<Appointment>) -> (WaitingRoomService, InMemoryAppointmentStore) {
    let store = InMemoryAppointmentStore::new();
    for r in records {
        store.seed(r).await;
    }
    (WaitingRoomService::new(Arc::new(store.clone())), store)
}

#[tokio::test]
async fn empty_waiting_room_derives_to_empty_list() {
    let (service, _) = service_with(vec![]).await;
    let entries = service.list_waiting(Uuid::new_v4()).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn queue_orders_by_join_time_first_joined_first_served() {
    let doctor = Uuid::new_v4();
    let base = Utc::now() - Duration::minutes(30);

    let third = record(doctor, AppointmentStatus::Scheduled, Some(base + Duration::minutes(20)));
    let first = record(doctor, AppointmentStatus::Scheduled, Some(base));
    let second = record(doctor, AppointmentStatus::Scheduled, Some(base + Duration::minutes(10)));

    let expected = [first.id, second.id, third.id];
    let (service, _) = service_with(vec![third, first, second]).await;

    let entries = service.list_waiting(doctor).await.unwrap();
    let ids: Vec<Uuid> = entries.iter().map(|e| e.appointment.id).collect();
    assert_eq!(ids, expected);

    let positions: Vec<usize> = entries.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn identical_join_times_break_ties_by_appointment_id() {
    let doctor = Uuid::new_v4();
    let joined = Utc::now() - Duration::minutes(5);

    let a = record(doctor, AppointmentStatus::Scheduled, Some(joined));
    let b = record(doctor, AppointmentStatus::Scheduled, Some(joined));

    let mut expected = [a.id, b.id];
    expected.sort();

    let (service, _) = service_with(vec![a, b]).await;
    let entries = service.list_waiting(doctor).await.unwrap();
    let ids: Vec<Uuid> = entries.iter().map(|e| e.appointment.id).collect();
    assert_eq!(ids, expected.to_vec());
}

#[tokio::test]
async fn queue_excludes_everything_that_is_not_waiting() {
    let doctor = Uuid::new_v4();
    let other_doctor = Uuid::new_v4();
    let joined = Utc::now() - Duration::minutes(1);

    let queued = record(doctor, AppointmentStatus::Scheduled, Some(joined));
    let queued_id = queued.id;

    let not_joined = record(doctor, AppointmentStatus::Scheduled, None);
    let in_progress = record(doctor, AppointmentStatus::InProgress, None);
    let cancelled = record(doctor, AppointmentStatus::Cancelled, None);
    let completed = record(doctor, AppointmentStatus::Completed, None);
    let someone_elses = record(other_doctor, AppointmentStatus::Scheduled, Some(joined));

    let (service, _) = service_with(vec![
        queued,
        not_joined,
        in_progress,
        cancelled,
        completed,
        someone_elses,
    ])
    .await;

    let entries = service.list_waiting(doctor).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].appointment.id, queued_id);
    assert_eq!(entries[0].position, 1);
}

#[tokio::test]
async fn wait_time_is_recomputed_from_join_stamp() {
    let doctor = Uuid::new_v4();
    let joined = Utc::now() - Duration::minutes(10);

    let (service, _) =
        service_with(vec![record(doctor, AppointmentStatus::Scheduled, Some(joined))]).await;

    let entries = service.list_waiting(doctor).await.unwrap();
    assert_eq!(entries.len(), 1);

    // About ten minutes, and never negative.
    let waited = entries[0].waited_seconds;
    assert!((595..=650).contains(&waited), "waited {} seconds", waited);
}

#[tokio::test]
async fn second_patient_joins_behind_the_first() {
    let doctor = Uuid::new_v4();
    let base = Utc::now() - Duration::minutes(3);

    let a = record(doctor, AppointmentStatus::Scheduled, Some(base));
    let a_id = a.id;
    let (service, store) = service_with(vec![a]).await;

    let entries = service.list_waiting(doctor).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].appointment.id, a_id);
    assert_eq!(entries[0].position, 1);

    let b = record(doctor, AppointmentStatus::Scheduled, Some(base + Duration::minutes(2)));
    let b_id = b.id;
    store.seed(b).await;

    let entries = service.list_waiting(doctor).await.unwrap();
    let ids: Vec<Uuid> = entries.iter().map(|e| e.appointment.id).collect();
    assert_eq!(ids, vec![a_id, b_id]);
}

#[tokio::test]
async fn position_lookup_finds_only_queued_appointments() {
    let doctor = Uuid::new_v4();
    let base = Utc::now() - Duration::minutes(8);

    let a = record(doctor, AppointmentStatus::Scheduled, Some(base));
    let b = record(doctor, AppointmentStatus::Scheduled, Some(base + Duration::minutes(1)));
    let idle = record(doctor, AppointmentStatus::Scheduled, None);
    let b_id = b.id;
    let idle_id = idle.id;

    let (service, _) = service_with(vec![a, b, idle]).await;

    assert_eq!(service.position(doctor, b_id).await.unwrap(), Some(2));
    assert_eq!(service.position(doctor, idle_id).await.unwrap(), None);
    assert_eq!(service.position(doctor, Uuid::new_v4()).await.unwrap(), None);
}
