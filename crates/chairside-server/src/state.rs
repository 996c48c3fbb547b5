//! Shared handler state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chairside_core::{Collaborators, Database};

use crate::error::ApiError;

/// Database location plus the engine collaborators.
///
/// Connections are not shared: each request opens its own on a blocking
/// worker, so SQLite's write lock is the only serialization point.
#[derive(Clone)]
pub struct AppState {
    db_path: Arc<PathBuf>,
    pub ctx: Collaborators,
}

impl AppState {
    pub fn new(db_path: impl Into<PathBuf>, ctx: Collaborators) -> Self {
        Self {
            db_path: Arc::new(db_path.into()),
            ctx,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `op` against a fresh connection on the blocking pool.
    pub async fn run_blocking<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &Collaborators) -> Result<T, ApiError> + Send + 'static,
    {
        let path = self.db_path.clone();
        let ctx = self.ctx.clone();
        tokio::task::spawn_blocking(move || {
            let db = Database::open_with(path.as_path(), ctx.config.busy_timeout())?;
            op(&db, &ctx)
        })
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))?
    }
}
