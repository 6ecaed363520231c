use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use uuid::Uuid;

use appointment_cell::feed::ChangeFeed;
use appointment_cell::identity::{FixedIdentityDirectory, UserRole};
use appointment_cell::models::{
    AppointmentError, AppointmentStatus, AppointmentType, BookAppointmentRequest,
    LifecycleCommand,
};
use appointment_cell::notifications::{NotificationEvent, RecordingNotificationSink};
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use appointment_cell::store::InMemoryAppointmentStore;

struct Harness {
    service: AppointmentLifecycleService,
    store: InMemoryAppointmentStore,
    sink: RecordingNotificationSink,
    feed: ChangeFeed,
    patient: Uuid,
    doctor: Uuid,
}

fn harness() -> Harness {
    let store = InMemoryAppointmentStore::new();
    let sink = RecordingNotificationSink::new();
    let feed = ChangeFeed::new();
    let patient = Uuid::new_v4();
    let doctor = Uuid::new_v4();

    let identity = FixedIdentityDirectory::new()
        .with_role(patient, UserRole::Patient)
        .with_role(doctor, UserRole::Doctor);

    let service = AppointmentLifecycleService::new(
        Arc::new(store.clone()),
        Arc::new(identity),
        Arc::new(sink.clone()),
        feed.clone(),
    );

    Harness {
        service,
        store,
        sink,
        feed,
        patient,
        doctor,
    }
}

fn scheduled_request(h: &Harness) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_id: h.patient,
        doctor_id: h.doctor,
        appointment_type: AppointmentType::Scheduled,
        scheduled_time: Some(Utc::now() + Duration::hours(2)),
        symptoms: vec!["headache".to_string()],
    }
}

fn instant_request(h: &Harness) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_id: h.patient,
        doctor_id: h.doctor,
        appointment_type: AppointmentType::Instant,
        scheduled_time: None,
        symptoms: vec![],
    }
}

#[tokio::test]
async fn booking_creates_scheduled_record() {
    let h = harness();

    let appointment = h.service.book(scheduled_request(&h)).await.unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.patient_id, h.patient);
    assert_eq!(appointment.doctor_id, h.doctor);
    assert!(!appointment.is_paid);
    assert!(appointment.payment_id.is_none());
    assert!(appointment.waiting_room_joined_at.is_none());
    assert_eq!(appointment.symptoms, vec!["headache".to_string()]);

    let delivered = h.sink.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event, NotificationEvent::AppointmentBooked);
    assert_eq!(delivered[0].recipient_user_id, h.doctor);
}

#[tokio::test]
async fn instant_booking_is_slotted_at_booking_time() {
    let h = harness();
    let before = Utc::now();

    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    assert!(appointment.scheduled_time >= before);
    assert!(appointment.scheduled_time <= Utc::now());
}

#[tokio::test]
async fn booking_rejects_missing_or_past_slot() {
    let h = harness();

    let mut request = scheduled_request(&h);
    request.scheduled_time = None;
    assert_matches!(
        h.service.book(request).await,
        Err(AppointmentError::Validation(_))
    );

    let mut request = scheduled_request(&h);
    request.scheduled_time = Some(Utc::now() - Duration::hours(1));
    assert_matches!(
        h.service.book(request).await,
        Err(AppointmentError::Validation(_))
    );
}

#[tokio::test]
async fn booking_rejects_swapped_roles() {
    let h = harness();

    let request = BookAppointmentRequest {
        patient_id: h.doctor,
        doctor_id: h.patient,
        appointment_type: AppointmentType::Instant,
        scheduled_time: None,
        symptoms: vec![],
    };

    assert_matches!(
        h.service.book(request).await,
        Err(AppointmentError::Validation(_))
    );
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn booking_rejects_unknown_users() {
    let h = harness();

    let request = BookAppointmentRequest {
        patient_id: Uuid::new_v4(),
        doctor_id: h.doctor,
        appointment_type: AppointmentType::Instant,
        scheduled_time: None,
        symptoms: vec![],
    };

    assert_matches!(
        h.service.book(request).await,
        Err(AppointmentError::Identity(_))
    );
}

#[tokio::test]
async fn get_missing_record_fails() {
    let h = harness();

    assert_matches!(
        h.service.get(Uuid::new_v4()).await,
        Err(AppointmentError::RecordNotFound)
    );
}

#[tokio::test]
async fn join_stamps_queue_time_and_notifies_doctor() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();
    h.sink.clear().await;

    let joined = h
        .service
        .join_waiting_room(appointment.id, h.patient)
        .await
        .unwrap();

    assert!(joined.waiting_room_joined_at.is_some());
    assert_eq!(joined.status, AppointmentStatus::Scheduled);

    let delivered = h.sink.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event, NotificationEvent::WaitingRoomJoined);
    assert_eq!(delivered[0].recipient_user_id, h.doctor);
}

#[tokio::test]
async fn join_twice_is_rejected() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    h.service
        .join_waiting_room(appointment.id, h.patient)
        .await
        .unwrap();
    h.sink.clear().await;

    assert_matches!(
        h.service.join_waiting_room(appointment.id, h.patient).await,
        Err(AppointmentError::InvalidTransition {
            command: LifecycleCommand::JoinWaitingRoom,
            ..
        })
    );
    assert!(h.sink.delivered().await.is_empty());
}

#[tokio::test]
async fn join_requires_the_patient() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    assert_matches!(
        h.service.join_waiting_room(appointment.id, h.doctor).await,
        Err(AppointmentError::NotAuthorized)
    );
    assert_matches!(
        h.service
            .join_waiting_room(appointment.id, Uuid::new_v4())
            .await,
        Err(AppointmentError::NotAuthorized)
    );
}

#[tokio::test]
async fn leave_clears_queue_stamp() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();
    h.service
        .join_waiting_room(appointment.id, h.patient)
        .await
        .unwrap();
    h.sink.clear().await;

    let left = h
        .service
        .leave_waiting_room(appointment.id, h.patient)
        .await
        .unwrap();

    assert!(left.waiting_room_joined_at.is_none());
    assert_eq!(left.status, AppointmentStatus::Scheduled);

    let delivered = h.sink.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event, NotificationEvent::WaitingRoomLeft);
    assert_eq!(delivered[0].recipient_user_id, h.doctor);
}

#[tokio::test]
async fn leave_without_joining_is_rejected() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    assert_matches!(
        h.service.leave_waiting_room(appointment.id, h.patient).await,
        Err(AppointmentError::InvalidTransition {
            command: LifecycleCommand::LeaveWaitingRoom,
            ..
        })
    );
}

#[tokio::test]
async fn start_clears_waiting_stamp_in_same_write() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();
    h.service
        .join_waiting_room(appointment.id, h.patient)
        .await
        .unwrap();
    h.sink.clear().await;

    let started = h.service.start(appointment.id, h.doctor).await.unwrap();

    assert_eq!(started.status, AppointmentStatus::InProgress);
    assert!(started.waiting_room_joined_at.is_none());

    // The stored record agrees: never in progress and queued at once.
    let stored = h.service.get(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::InProgress);
    assert!(stored.waiting_room_joined_at.is_none());

    let delivered = h.sink.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].event, NotificationEvent::AppointmentStarted);
    assert_eq!(delivered[0].recipient_user_id, h.patient);
}

#[tokio::test]
async fn start_requires_the_doctor() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    assert_matches!(
        h.service.start(appointment.id, h.patient).await,
        Err(AppointmentError::NotAuthorized)
    );
    assert_matches!(
        h.service.start(appointment.id, Uuid::new_v4()).await,
        Err(AppointmentError::NotAuthorized)
    );
}

#[tokio::test]
async fn second_start_is_rejected() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();
    h.service.start(appointment.id, h.doctor).await.unwrap();

    assert_matches!(
        h.service.start(appointment.id, h.doctor).await,
        Err(AppointmentError::InvalidTransition {
            status: AppointmentStatus::InProgress,
            command: LifecycleCommand::Start,
        })
    );
}

#[tokio::test]
async fn complete_notifies_both_parties() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();
    h.service.start(appointment.id, h.doctor).await.unwrap();
    h.sink.clear().await;

    let completed = h.service.complete(appointment.id, h.doctor).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let delivered = h.sink.delivered().await;
    assert_eq!(delivered.len(), 2);
    assert!(delivered
        .iter()
        .all(|i| i.event == NotificationEvent::AppointmentCompleted));

    let recipients: Vec<Uuid> = delivered.iter().map(|i| i.recipient_user_id).collect();
    assert!(recipients.contains(&h.patient));
    assert!(recipients.contains(&h.doctor));
}

#[tokio::test]
async fn complete_requires_in_progress() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    assert_matches!(
        h.service.complete(appointment.id, h.doctor).await,
        Err(AppointmentError::InvalidTransition {
            status: AppointmentStatus::Scheduled,
            command: LifecycleCommand::Complete,
        })
    );
}

#[tokio::test]
async fn either_party_can_cancel_a_live_appointment() {
    let h = harness();

    let by_patient = h.service.book(instant_request(&h)).await.unwrap();
    let cancelled = h.service.cancel(by_patient.id, h.patient).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let by_doctor = h.service.book(instant_request(&h)).await.unwrap();
    h.service.start(by_doctor.id, h.doctor).await.unwrap();
    h.sink.clear().await;

    let cancelled = h.service.cancel(by_doctor.id, h.doctor).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let delivered = h.sink.delivered().await;
    assert_eq!(delivered.len(), 2);
    assert!(delivered
        .iter()
        .all(|i| i.event == NotificationEvent::AppointmentCancelled));
}

#[tokio::test]
async fn cancel_by_stranger_fails_and_leaves_record_unchanged() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();
    h.sink.clear().await;

    assert_matches!(
        h.service.cancel(appointment.id, Uuid::new_v4()).await,
        Err(AppointmentError::NotAuthorized)
    );

    let stored = h.service.get(appointment.id).await.unwrap();
    assert_eq!(stored, appointment);
    assert!(h.sink.delivered().await.is_empty());
}

#[tokio::test]
async fn cancel_clears_waiting_stamp() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();
    h.service
        .join_waiting_room(appointment.id, h.patient)
        .await
        .unwrap();

    let cancelled = h.service.cancel(appointment.id, h.patient).await.unwrap();
    assert!(cancelled.waiting_room_joined_at.is_none());
}

#[tokio::test]
async fn terminal_statuses_absorb_every_command() {
    let h = harness();

    for terminal in ["completed", "cancelled"] {
        let appointment = h.service.book(instant_request(&h)).await.unwrap();
        match terminal {
            "completed" => {
                h.service.start(appointment.id, h.doctor).await.unwrap();
                h.service.complete(appointment.id, h.doctor).await.unwrap();
            }
            _ => {
                h.service.cancel(appointment.id, h.patient).await.unwrap();
            }
        }
        h.sink.clear().await;

        assert_matches!(
            h.service.join_waiting_room(appointment.id, h.patient).await,
            Err(AppointmentError::InvalidTransition { .. })
        );
        assert_matches!(
            h.service.leave_waiting_room(appointment.id, h.patient).await,
            Err(AppointmentError::InvalidTransition { .. })
        );
        assert_matches!(
            h.service.start(appointment.id, h.doctor).await,
            Err(AppointmentError::InvalidTransition { .. })
        );
        assert_matches!(
            h.service.cancel(appointment.id, h.doctor).await,
            Err(AppointmentError::InvalidTransition { .. })
        );

        // Invalid commands owe nobody a notification.
        assert!(h.sink.delivered().await.is_empty());

        let stored = h.service.get(appointment.id).await.unwrap();
        assert!(stored.status.is_terminal());
    }
}

#[tokio::test]
async fn committed_transitions_reach_feed_subscribers() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    let mut doctor_feed = h.feed.subscribe_doctor(h.doctor).await;
    let mut patient_feed = h.feed.subscribe_patient(h.patient).await;

    h.service
        .join_waiting_room(appointment.id, h.patient)
        .await
        .unwrap();

    let change = doctor_feed.recv().await.unwrap();
    assert_eq!(change.appointment.id, appointment.id);
    assert_eq!(change.previous_status, Some(AppointmentStatus::Scheduled));
    assert!(change.appointment.is_waiting());

    let change = patient_feed.recv().await.unwrap();
    assert_eq!(change.appointment.id, appointment.id);
}

#[tokio::test]
async fn payment_fields_pass_through_untouched() {
    let h = harness();
    let appointment = h.service.book(instant_request(&h)).await.unwrap();

    // The payment collaborator marks the record paid out-of-band.
    let mut paid = appointment.clone();
    let payment_id = Uuid::new_v4();
    paid.is_paid = true;
    paid.payment_id = Some(payment_id);
    paid.updated_at = Utc::now();
    h.store.seed(paid).await;

    let started = h.service.start(appointment.id, h.doctor).await.unwrap();
    assert!(started.is_paid);
    assert_eq!(started.payment_id, Some(payment_id));
}
