// libs/appointment-cell/src/identity.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::AppointmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
}

/// Identity collaborator consulted by the authorization guards. Nothing
/// else in the cell touches identity.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn role_of(&self, user_id: Uuid) -> Result<UserRole, AppointmentError>;
}

/// Fixed role map for tests and dev mode.
#[derive(Debug, Clone, Default)]
pub struct FixedIdentityDirectory {
    roles: HashMap<Uuid, UserRole>,
}

impl FixedIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, user_id: Uuid, role: UserRole) -> Self {
        self.roles.insert(user_id, role);
        self
    }
}

#[async_trait]
impl IdentityDirectory for FixedIdentityDirectory {
    async fn role_of(&self, user_id: Uuid) -> Result<UserRole, AppointmentError> {
        self.roles
            .get(&user_id)
            .copied()
            .ok_or_else(|| AppointmentError::Identity(format!("unknown user {}", user_id)))
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[allow(dead_code)]
    id: Uuid,
    role: UserRole,
}

/// Role lookup against the profiles table of the remote store.
pub struct SupabaseIdentityDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseIdentityDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl IdentityDirectory for SupabaseIdentityDirectory {
    async fn role_of(&self, user_id: Uuid) -> Result<UserRole, AppointmentError> {
        let path = format!("/rest/v1/profiles?select=id,role&id=eq.{}", user_id);

        let rows: Vec<ProfileRow> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| AppointmentError::Identity(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(|row| row.role)
            .ok_or_else(|| AppointmentError::Identity(format!("unknown user {}", user_id)))
    }
}
