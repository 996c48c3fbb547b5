//! Chairside HTTP server.
//!
//! Thin axum layer over `chairside_core`. Each request opens its own SQLite
//! connection on the blocking pool; engine errors and malformed input map to
//! status codes in [`error::ApiError`].

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use chairside_core::{Collaborators, Database, LogSink, NotificationSink, QueuedSink};

pub use config::ServerConfig;
pub use error::ApiError;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use state::AppState;

/// Build the router over `state`.
pub fn app(state: AppState) -> Router {
    routes::router().with_state(state)
}

/// Wire collaborators from config and make sure the schema exists.
pub fn build_state(config: &ServerConfig) -> Result<AppState, ApiError> {
    Database::open_with(&config.database_path, config.engine.busy_timeout())?;

    let notifier = QueuedSink::spawn(config.engine.notification_queue, |notification| {
        LogSink.notify(notification.clone())
    });
    let ctx = Collaborators::new(config.engine.clone()).with_notifier(Arc::new(notifier));
    Ok(AppState::new(config.database_path.clone(), ctx))
}
