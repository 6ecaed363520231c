use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::identity::FixedIdentityDirectory;
use appointment_cell::notifications::TracingNotificationSink;
use appointment_cell::store::InMemoryAppointmentStore;
use appointment_cell::AppointmentCellState;
use shared_config::AppConfig;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Teleclinic API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let state = if config.is_configured() {
        Arc::new(AppointmentCellState::supabase(Arc::clone(&config)))
    } else {
        warn!("Remote store not configured; falling back to in-memory store (dev only)");
        Arc::new(AppointmentCellState::new(
            Arc::clone(&config),
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(FixedIdentityDirectory::new()),
            Arc::new(TracingNotificationSink::new()),
        ))
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
