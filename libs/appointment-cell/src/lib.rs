// libs/appointment-cell/src/lib.rs
pub mod feed;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod notifications;
pub mod router;
pub mod services;
pub mod store;

use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::feed::ChangeFeed;
use crate::identity::{IdentityDirectory, SupabaseIdentityDirectory};
use crate::notifications::{NotificationSink, TracingNotificationSink};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::waiting_room::WaitingRoomService;
use crate::store::{AppointmentStore, SupabaseAppointmentStore};

/// Shared state for the appointment routes. Collaborators are injected
/// here once, at wiring time; handlers and services only ever see the
/// trait objects.
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub lifecycle: AppointmentLifecycleService,
    pub waiting_room: WaitingRoomService,
    pub feed: ChangeFeed,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn AppointmentStore>,
        identity: Arc<dyn IdentityDirectory>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let feed = ChangeFeed::new();
        let lifecycle = AppointmentLifecycleService::new(
            Arc::clone(&store),
            identity,
            notifications,
            feed.clone(),
        );
        let waiting_room = WaitingRoomService::new(store);

        Self {
            config,
            lifecycle,
            waiting_room,
            feed,
        }
    }

    /// Production wiring: Supabase-backed store and identity, notification
    /// intents handed to the log shipper.
    pub fn supabase(config: Arc<AppConfig>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(&config));
        let store = Arc::new(SupabaseAppointmentStore::new(Arc::clone(&supabase)));
        let identity = Arc::new(SupabaseIdentityDirectory::new(supabase));

        Self::new(
            config,
            store,
            identity,
            Arc::new(TracingNotificationSink::new()),
        )
    }
}
