// libs/appointment-cell/src/store/mod.rs
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus};

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Restrict to records with `waiting_room_joined_at` set.
    pub waiting_only: bool,
}

impl AppointmentFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    pub fn for_doctor(doctor_id: Uuid) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            ..Self::default()
        }
    }

    /// The waiting-room derivation filter: scheduled appointments of one
    /// doctor whose patient has joined.
    pub fn waiting_room(doctor_id: Uuid) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            status: Some(AppointmentStatus::Scheduled),
            waiting_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        if let Some(patient_id) = self.patient_id {
            if appointment.patient_id != patient_id {
                return false;
            }
        }
        if let Some(doctor_id) = self.doctor_id {
            if appointment.doctor_id != doctor_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if appointment.status != status {
                return false;
            }
        }
        if self.waiting_only && appointment.waiting_room_joined_at.is_none() {
            return false;
        }
        true
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("optimistic write conflict")]
    Conflict,

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for crate::models::AppointmentError {
    fn from(error: StoreError) -> Self {
        use crate::models::AppointmentError;
        match error {
            StoreError::NotFound => AppointmentError::RecordNotFound,
            StoreError::Conflict => AppointmentError::StoreConflict,
            StoreError::Backend(message) => AppointmentError::Store(message),
        }
    }
}

/// Narrow seam to the remote document store. Every lifecycle command is one
/// atomic read-modify-write against a single record through this trait; no
/// cross-record transactions are used or assumed.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Single-record compare-and-swap keyed on `updated_at`. The write only
    /// lands if the stored record still carries `expected_updated_at`;
    /// otherwise the caller lost the race and gets `Conflict`.
    async fn update(
        &self,
        appointment: Appointment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;

    async fn query(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;
}
