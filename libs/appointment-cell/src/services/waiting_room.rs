// libs/appointment-cell/src/services/waiting_room.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentError, WaitingRoomEntry};
use crate::store::{AppointmentFilter, AppointmentStore};

/// The waiting room is not stored anywhere: it is derived on every read
/// from the appointment records themselves. One source of truth, no dual
/// writes to drift out of sync.
pub struct WaitingRoomService {
    store: Arc<dyn AppointmentStore>,
}

impl WaitingRoomService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Current queue for one doctor: scheduled appointments with a join
    /// stamp, first-joined first-served, ties broken by appointment id so
    /// the order is a strict total order. Positions are 1-indexed and wait
    /// times are computed against now, never cached.
    pub async fn list_waiting(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<WaitingRoomEntry>, AppointmentError> {
        let mut waiting = self
            .store
            .query(AppointmentFilter::waiting_room(doctor_id))
            .await
            .map_err(AppointmentError::from)?;

        waiting.sort_by_key(|a| (a.waiting_room_joined_at, a.id));

        let now = Utc::now();
        let entries: Vec<WaitingRoomEntry> = waiting
            .into_iter()
            .enumerate()
            .map(|(index, appointment)| {
                let waited_seconds = appointment
                    .waiting_room_joined_at
                    .map(|joined| (now - joined).num_seconds().max(0))
                    .unwrap_or(0);

                WaitingRoomEntry {
                    appointment,
                    position: index + 1,
                    waited_seconds,
                }
            })
            .collect();

        debug!(
            "Derived waiting room for doctor {}: {} patient(s) queued",
            doctor_id,
            entries.len()
        );

        Ok(entries)
    }

    /// 1-indexed rank of one appointment in its doctor's queue, if queued.
    pub async fn position(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<usize>, AppointmentError> {
        let entries = self.list_waiting(doctor_id).await?;
        Ok(entries
            .iter()
            .find(|entry| entry.appointment.id == appointment_id)
            .map(|entry| entry.position))
    }
}
