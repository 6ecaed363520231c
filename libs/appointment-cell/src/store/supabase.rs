// libs/appointment-cell/src/store/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::Appointment;
use crate::store::{AppointmentFilter, AppointmentStore, StoreError};

const TABLE_PATH: &str = "/rest/v1/appointments";

/// Store backend over the Supabase REST interface. The optimistic check is
/// pushed into the row filter: the PATCH carries `updated_at=eq.<expected>`,
/// so a concurrent writer that already bumped the version makes the write
/// touch zero rows, which surfaces as `Conflict`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn version_literal(ts: DateTime<Utc>) -> String {
        // Micros with a literal Z keeps the value URL-safe (no '+').
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn filter_path(filter: &AppointmentFilter) -> String {
        let mut path = format!("{}?select=*", TABLE_PATH);
        if let Some(patient_id) = filter.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = filter.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        if filter.waiting_only {
            path.push_str("&waiting_room_joined_at=not.is.null");
        }
        path.push_str("&order=waiting_room_joined_at.asc,id.asc");
        path
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?select=*&id=eq.{}", TABLE_PATH, id);

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut rows: Vec<Appointment> = self
            .supabase
            .request_returning(Method::POST, TABLE_PATH, None, Some(body))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.pop().ok_or_else(|| {
            StoreError::Backend("insert returned no representation".to_string())
        })
    }

    async fn update(
        &self,
        appointment: Appointment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let path = format!(
            "{}?id=eq.{}&updated_at=eq.{}",
            TABLE_PATH,
            appointment.id,
            Self::version_literal(expected_updated_at),
        );

        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut rows: Vec<Appointment> = self
            .supabase
            .request_returning(Method::PATCH, &path, None, Some(body))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match rows.pop() {
            Some(updated) => Ok(updated),
            None => {
                // Zero rows touched: either the record is gone or somebody
                // else bumped the version first. One extra read tells which.
                debug!("Filtered update touched no rows for {}", appointment.id);
                match self.get(appointment.id).await? {
                    Some(_) => Err(StoreError::Conflict),
                    None => Err(StoreError::NotFound),
                }
            }
        }
    }

    async fn query(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let path = Self::filter_path(&filter);

        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
