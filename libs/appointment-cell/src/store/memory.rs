// libs/appointment-cell/src/store/memory.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::Appointment;
use crate::store::{AppointmentFilter, AppointmentStore, StoreError};

/// Tokio-RwLock backed store used by tests and by dev mode when no remote
/// backend is configured. The write lock makes each update's
/// check-then-write atomic, matching the per-record atomicity the remote
/// store guarantees.
#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    records: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing lifecycle guards. Test setup only.
    pub async fn seed(&self, appointment: Appointment) {
        let mut records = self.records.write().await;
        records.insert(appointment.id, appointment);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&appointment.id) {
            return Err(StoreError::Conflict);
        }
        records.insert(appointment.id, appointment.clone());
        debug!("Inserted appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn update(
        &self,
        appointment: Appointment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut records = self.records.write().await;

        let stored = records
            .get(&appointment.id)
            .ok_or(StoreError::NotFound)?;

        if stored.updated_at != expected_updated_at {
            debug!(
                "Lost write race on appointment {}: expected version {}, found {}",
                appointment.id, expected_updated_at, stored.updated_at
            );
            return Err(StoreError::Conflict);
        }

        records.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn query(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }
}
