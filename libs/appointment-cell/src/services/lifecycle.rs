// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::feed::{AppointmentChange, ChangeFeed};
use crate::identity::{IdentityDirectory, UserRole};
use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentType,
    BookAppointmentRequest, LifecycleCommand,
};
use crate::notifications::{NotificationEvent, NotificationIntent, NotificationSink};
use crate::store::{AppointmentFilter, AppointmentStore};

/// Owner of every appointment status transition and its guards. Holds no
/// mutable state of its own: each command is a fresh read, a guard check
/// against that fresh record, and one version-checked write. Collaborators
/// are injected explicitly; there is no ambient registry to resolve them
/// from.
pub struct AppointmentLifecycleService {
    store: Arc<dyn AppointmentStore>,
    identity: Arc<dyn IdentityDirectory>,
    notifications: Arc<dyn NotificationSink>,
    feed: ChangeFeed,
}

impl AppointmentLifecycleService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        identity: Arc<dyn IdentityDirectory>,
        notifications: Arc<dyn NotificationSink>,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            store,
            identity,
            notifications,
            feed,
        }
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await
            .map_err(AppointmentError::from)?
            .ok_or(AppointmentError::RecordNotFound)
    }

    /// Create the record in its initial `scheduled` state and tell the
    /// doctor a booking landed on their calendar.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking {} appointment for patient {} with doctor {}",
            request.appointment_type, request.patient_id, request.doctor_id
        );

        if request.patient_id == request.doctor_id {
            return Err(AppointmentError::Validation(
                "Patient and doctor must be different users".to_string(),
            ));
        }

        let patient_role = self.identity.role_of(request.patient_id).await?;
        if patient_role != UserRole::Patient {
            return Err(AppointmentError::Validation(
                "patient_id does not reference a patient account".to_string(),
            ));
        }

        let doctor_role = self.identity.role_of(request.doctor_id).await?;
        if doctor_role != UserRole::Doctor {
            return Err(AppointmentError::Validation(
                "doctor_id does not reference a doctor account".to_string(),
            ));
        }

        let now = Utc::now();
        let scheduled_time = match request.appointment_type {
            AppointmentType::Instant => now,
            AppointmentType::Scheduled => {
                let requested = request.scheduled_time.ok_or_else(|| {
                    AppointmentError::Validation(
                        "scheduled_time is required for scheduled appointments".to_string(),
                    )
                })?;
                if requested <= now {
                    return Err(AppointmentError::Validation(
                        "scheduled_time must be in the future".to_string(),
                    ));
                }
                requested
            }
        };

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            appointment_type: request.appointment_type,
            scheduled_time,
            status: AppointmentStatus::Scheduled,
            is_paid: false,
            payment_id: None,
            waiting_room_joined_at: None,
            symptoms: request.symptoms,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .store
            .insert(appointment)
            .await
            .map_err(AppointmentError::from)?;

        self.finish(
            None,
            &created,
            NotificationEvent::AppointmentBooked,
            &[created.doctor_id],
        )
        .await;

        Ok(created)
    }

    /// Patient signals readiness for the consultation. Stamps the queue
    /// join time; ordering in the waiting room derives from it.
    pub async fn join_waiting_room(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;

        if current.patient_id != actor_id {
            warn!(
                "User {} tried to join waiting room for appointment {} they are not the patient of",
                actor_id, appointment_id
            );
            return Err(AppointmentError::NotAuthorized);
        }

        if current.status != AppointmentStatus::Scheduled {
            return Err(invalid(current.status, LifecycleCommand::JoinWaitingRoom));
        }
        if current.waiting_room_joined_at.is_some() {
            debug!("Patient already queued for appointment {}", appointment_id);
            return Err(invalid(current.status, LifecycleCommand::JoinWaitingRoom));
        }

        let now = Utc::now();
        let mut updated = current.clone();
        updated.waiting_room_joined_at = Some(now);
        updated.updated_at = now;

        let committed = self.commit(updated, &current).await?;
        info!(
            "Patient {} joined waiting room for appointment {}",
            actor_id, appointment_id
        );

        self.finish(
            Some(current.status),
            &committed,
            NotificationEvent::WaitingRoomJoined,
            &[committed.doctor_id],
        )
        .await;

        Ok(committed)
    }

    pub async fn leave_waiting_room(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;

        if current.patient_id != actor_id {
            return Err(AppointmentError::NotAuthorized);
        }

        if current.waiting_room_joined_at.is_none() {
            return Err(invalid(current.status, LifecycleCommand::LeaveWaitingRoom));
        }

        let now = Utc::now();
        let mut updated = current.clone();
        updated.waiting_room_joined_at = None;
        updated.updated_at = now;

        let committed = self.commit(updated, &current).await?;
        info!(
            "Patient {} left waiting room for appointment {}",
            actor_id, appointment_id
        );

        self.finish(
            Some(current.status),
            &committed,
            NotificationEvent::WaitingRoomLeft,
            &[committed.doctor_id],
        )
        .await;

        Ok(committed)
    }

    /// Doctor calls the patient in. Clears the waiting-room stamp in the
    /// same write: an appointment is never in progress and queued at once.
    pub async fn start(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;

        if current.doctor_id != actor_id {
            warn!(
                "User {} tried to start appointment {} they are not the doctor of",
                actor_id, appointment_id
            );
            return Err(AppointmentError::NotAuthorized);
        }
        let role = self.identity.role_of(actor_id).await?;
        if role != UserRole::Doctor {
            return Err(AppointmentError::NotAuthorized);
        }

        if current.status != AppointmentStatus::Scheduled {
            return Err(invalid(current.status, LifecycleCommand::Start));
        }

        let now = Utc::now();
        let mut updated = current.clone();
        updated.status = AppointmentStatus::InProgress;
        updated.waiting_room_joined_at = None;
        updated.updated_at = now;

        let committed = self.commit(updated, &current).await?;
        info!("Doctor {} started appointment {}", actor_id, appointment_id);

        self.finish(
            Some(current.status),
            &committed,
            NotificationEvent::AppointmentStarted,
            &[committed.patient_id],
        )
        .await;

        Ok(committed)
    }

    pub async fn complete(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;

        if current.doctor_id != actor_id {
            return Err(AppointmentError::NotAuthorized);
        }
        let role = self.identity.role_of(actor_id).await?;
        if role != UserRole::Doctor {
            return Err(AppointmentError::NotAuthorized);
        }

        if current.status != AppointmentStatus::InProgress {
            return Err(invalid(current.status, LifecycleCommand::Complete));
        }

        let now = Utc::now();
        let mut updated = current.clone();
        updated.status = AppointmentStatus::Completed;
        updated.updated_at = now;

        let committed = self.commit(updated, &current).await?;
        info!("Doctor {} completed appointment {}", actor_id, appointment_id);

        self.finish(
            Some(current.status),
            &committed,
            NotificationEvent::AppointmentCompleted,
            &[committed.patient_id, committed.doctor_id],
        )
        .await;

        Ok(committed)
    }

    /// Either party may cancel while the appointment is still live.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;

        if !current.involves(actor_id) {
            warn!(
                "User {} tried to cancel appointment {} they are not a party to",
                actor_id, appointment_id
            );
            return Err(AppointmentError::NotAuthorized);
        }

        if current.status.is_terminal() {
            return Err(invalid(current.status, LifecycleCommand::Cancel));
        }

        let now = Utc::now();
        let mut updated = current.clone();
        updated.status = AppointmentStatus::Cancelled;
        updated.waiting_room_joined_at = None;
        updated.updated_at = now;

        let committed = self.commit(updated, &current).await?;
        info!("User {} cancelled appointment {}", actor_id, appointment_id);

        self.finish(
            Some(current.status),
            &committed,
            NotificationEvent::AppointmentCancelled,
            &[committed.patient_id, committed.doctor_id],
        )
        .await;

        Ok(committed)
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .query(AppointmentFilter::for_patient(patient_id))
            .await
            .map_err(AppointmentError::from)
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .query(AppointmentFilter::for_doctor(doctor_id))
            .await
            .map_err(AppointmentError::from)
    }

    /// One version-checked write. The guard was evaluated against the same
    /// record version named here, so a racing writer surfaces as
    /// `StoreConflict` instead of clobbering state.
    async fn commit(
        &self,
        updated: Appointment,
        read_version: &Appointment,
    ) -> Result<Appointment, AppointmentError> {
        self.store
            .update(updated, read_version.updated_at)
            .await
            .map_err(AppointmentError::from)
    }

    /// Post-commit fan-out: one intent per recipient plus a change-feed
    /// publish. Best effort by contract; nothing here can undo the write.
    async fn finish(
        &self,
        previous_status: Option<AppointmentStatus>,
        appointment: &Appointment,
        event: NotificationEvent,
        recipients: &[Uuid],
    ) {
        for &recipient in recipients {
            let intent = NotificationIntent::for_appointment(event, recipient, appointment);
            self.notifications.deliver(intent).await;
        }

        self.feed
            .publish(AppointmentChange {
                appointment: appointment.clone(),
                previous_status,
                changed_at: Utc::now(),
            })
            .await;
    }
}

fn invalid(status: AppointmentStatus, command: LifecycleCommand) -> AppointmentError {
    debug!("Rejected command {} while status is {}", command, status);
    AppointmentError::InvalidTransition { status, command }
}
