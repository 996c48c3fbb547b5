//! Error taxonomy shared by the queue, billing and settlement operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::db::DbError;
use crate::models::VisitState;

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid visit transition: {from} -> {to}")]
    InvalidTransition { from: VisitState, to: VisitState },

    #[error("Day {date} is closed for clinic {clinic_id}")]
    DayLocked { clinic_id: String, date: NaiveDate },

    #[error("Day {date} already closed for clinic {clinic_id}")]
    AlreadyClosed { clinic_id: String, date: NaiveDate },

    #[error("Write contention persisted after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type ClinicResult<T> = Result<T, ClinicError>;

impl From<rusqlite::Error> for ClinicError {
    fn from(e: rusqlite::Error) -> Self {
        ClinicError::Database(DbError::Sqlite(e))
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::Database(DbError::Json(e))
    }
}

impl ClinicError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ClinicError::Validation(_) => "VALIDATION_ERROR",
            ClinicError::NotFound(_) => "NOT_FOUND",
            ClinicError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ClinicError::DayLocked { .. } => "DAY_LOCKED",
            ClinicError::AlreadyClosed { .. } => "ALREADY_CLOSED",
            ClinicError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            ClinicError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Another writer held the database lock past the busy timeout.
    pub fn is_contention(&self) -> bool {
        matches!(self, ClinicError::Database(e) if e.is_busy())
    }
}

/// Reject blank identifiers.
pub(crate) fn require_id(value: &str, field: &str) -> ClinicResult<()> {
    if value.trim().is_empty() {
        return Err(ClinicError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
