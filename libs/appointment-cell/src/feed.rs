// libs/appointment-cell/src/feed.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus};

pub type ChangeSender = broadcast::Sender<AppointmentChange>;
pub type ChangeReceiver = broadcast::Receiver<AppointmentChange>;

/// One committed mutation of one appointment record, as observed at the
/// store boundary.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentChange {
    pub appointment: Appointment,
    pub previous_status: Option<AppointmentStatus>,
    pub changed_at: DateTime<Utc>,
}

/// In-process change feed: every committed write is fanned out to
/// per-doctor and per-patient broadcast channels plus a global one. UI
/// observers subscribe here instead of polling the store.
pub struct ChangeFeed {
    doctor_channels: Arc<RwLock<HashMap<Uuid, ChangeSender>>>,
    patient_channels: Arc<RwLock<HashMap<Uuid, ChangeSender>>>,
    global_sender: ChangeSender,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(1000);

        Self {
            doctor_channels: Arc::new(RwLock::new(HashMap::new())),
            patient_channels: Arc::new(RwLock::new(HashMap::new())),
            global_sender,
        }
    }

    pub async fn subscribe_doctor(&self, doctor_id: Uuid) -> ChangeReceiver {
        let mut channels = self.doctor_channels.write().await;
        let sender = channels
            .entry(doctor_id)
            .or_insert_with(|| broadcast::channel(100).0);
        debug!("Doctor {} subscribed to appointment changes", doctor_id);
        sender.subscribe()
    }

    pub async fn subscribe_patient(&self, patient_id: Uuid) -> ChangeReceiver {
        let mut channels = self.patient_channels.write().await;
        let sender = channels
            .entry(patient_id)
            .or_insert_with(|| broadcast::channel(100).0);
        debug!("Patient {} subscribed to appointment changes", patient_id);
        sender.subscribe()
    }

    pub fn subscribe_global(&self) -> ChangeReceiver {
        self.global_sender.subscribe()
    }

    /// Best-effort publish; a closed or lagging subscriber never affects
    /// the committed write.
    pub async fn publish(&self, change: AppointmentChange) {
        {
            let channels = self.doctor_channels.read().await;
            if let Some(sender) = channels.get(&change.appointment.doctor_id) {
                if sender.send(change.clone()).is_err() {
                    debug!(
                        "No live subscribers for doctor {}",
                        change.appointment.doctor_id
                    );
                }
            }
        }

        {
            let channels = self.patient_channels.read().await;
            if let Some(sender) = channels.get(&change.appointment.patient_id) {
                if sender.send(change.clone()).is_err() {
                    debug!(
                        "No live subscribers for patient {}",
                        change.appointment.patient_id
                    );
                }
            }
        }

        if self.global_sender.send(change).is_err() {
            debug!("No live global subscribers");
        }
    }

    pub async fn active_channels(&self) -> (usize, usize) {
        let doctors = self.doctor_channels.read().await.len();
        let patients = self.patient_channels.read().await.len();
        (doctors, patients)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChangeFeed {
    fn clone(&self) -> Self {
        Self {
            doctor_channels: Arc::clone(&self.doctor_channels),
            patient_channels: Arc::clone(&self.patient_channels),
            global_sender: self.global_sender.clone(),
        }
    }
}
