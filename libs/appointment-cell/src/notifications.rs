// libs/appointment-cell/src/notifications.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::Appointment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    AppointmentBooked,
    WaitingRoomJoined,
    WaitingRoomLeft,
    AppointmentStarted,
    AppointmentCompleted,
    AppointmentCancelled,
}

/// A request to inform one user of one event. The cell only decides that a
/// notification is owed and to whom; delivery belongs to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub event: NotificationEvent,
    pub recipient_user_id: Uuid,
    pub payload: serde_json::Value,
}

impl NotificationIntent {
    pub fn for_appointment(
        event: NotificationEvent,
        recipient_user_id: Uuid,
        appointment: &Appointment,
    ) -> Self {
        Self {
            event,
            recipient_user_id,
            payload: json!({
                "appointment_id": appointment.id,
                "patient_id": appointment.patient_id,
                "doctor_id": appointment.doctor_id,
                "status": appointment.status,
                "scheduled_time": appointment.scheduled_time,
            }),
        }
    }
}

/// Delivery collaborator. Implementations swallow their own failures;
/// a broken sink must never fail or roll back a committed transition.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, intent: NotificationIntent);
}

/// Default sink: structured log lines, handed off to whatever ships them.
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn deliver(&self, intent: NotificationIntent) {
        info!(
            event = ?intent.event,
            recipient = %intent.recipient_user_id,
            "Notification intent emitted"
        );
    }
}

/// Sink that keeps every delivered intent in memory so tests can assert
/// fan-out exactly.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    delivered: Arc<RwLock<Vec<NotificationIntent>>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delivered(&self) -> Vec<NotificationIntent> {
        self.delivered.read().await.clone()
    }

    pub async fn clear(&self) {
        self.delivered.write().await.clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn deliver(&self, intent: NotificationIntent) {
        self.delivered.write().await.push(intent);
    }
}
