// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODEL
// ==============================================================================

/// One appointment record as stored in the backend. The record is the single
/// source of truth for both the consultation lifecycle and the derived
/// waiting-room queue; it is never deleted, cancellation is a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_type: AppointmentType,
    pub scheduled_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// Written by the payment collaborator only; copied through unchanged here.
    pub is_paid: bool,
    pub payment_id: Option<Uuid>,
    /// Non-null exactly while the patient is queued for this consultation.
    pub waiting_room_joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Doubles as the optimistic concurrency token for filtered writes.
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    pub fn is_waiting(&self) -> bool {
        self.status == AppointmentStatus::Scheduled && self.waiting_room_joined_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Completed and cancelled are absorbing: no command transitions out.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    /// Booked against a future slot.
    Scheduled,
    /// Same-day consultation, slotted at booking time.
    Instant,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Scheduled => write!(f, "scheduled"),
            AppointmentType::Instant => write!(f, "instant"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_type: AppointmentType,
    /// Required for scheduled appointments; ignored for instant ones, which
    /// are slotted at booking time.
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

/// One row of the derived waiting-room queue. Position and wait time are
/// recomputed on every read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingRoomEntry {
    pub appointment: Appointment,
    /// 1-indexed rank, first-joined first-served.
    pub position: usize,
    pub waited_seconds: i64,
}

// ==============================================================================
// LIFECYCLE COMMANDS AND ERRORS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleCommand {
    Book,
    JoinWaitingRoom,
    LeaveWaitingRoom,
    Start,
    Complete,
    Cancel,
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleCommand::Book => write!(f, "book"),
            LifecycleCommand::JoinWaitingRoom => write!(f, "join_waiting_room"),
            LifecycleCommand::LeaveWaitingRoom => write!(f, "leave_waiting_room"),
            LifecycleCommand::Start => write!(f, "start"),
            LifecycleCommand::Complete => write!(f, "complete"),
            LifecycleCommand::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    RecordNotFound,

    #[error("Command {command} is not valid while appointment is {status}")]
    InvalidTransition {
        status: AppointmentStatus,
        command: LifecycleCommand,
    },

    #[error("Actor is not authorized to act on this appointment")]
    NotAuthorized,

    #[error("Concurrent update won the race; re-read and retry with fresh state")]
    StoreConflict,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Identity lookup failed: {0}")]
    Identity(String),
}
