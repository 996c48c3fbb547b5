//! HTTP routes.

mod appointments;
mod billing;
mod settlement;

pub use appointments::{advance_visit, check_in, queue, schedule, CheckInBody, QueuedVisit, ScheduleBody, StatusBody};
pub use billing::{record_invoice, InvoiceBody, InvoiceLineBody};
pub use settlement::{
    close_day, daily_transactions, journal_verify, settlement_status, unlock_day, verify_transaction,
    CloseBody, DateQuery, StatusResponse, UnlockBody,
};

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/appointments/check-in", post(check_in))
        .route("/appointments/schedule", post(schedule))
        .route("/appointments/queue/:clinic_id", get(queue))
        .route("/appointments/:visit_id/status", post(advance_visit))
        .route("/billing/invoice", post(record_invoice))
        .route("/settlement/close/:clinic_id", post(close_day))
        .route("/settlement/unlock/:clinic_id", post(unlock_day))
        .route("/settlement/status/:clinic_id", get(settlement_status))
        .route("/settlement/transactions/:clinic_id", get(daily_transactions))
        .route("/settlement/verify/:billing_id", post(verify_transaction))
        .route("/settlement/journal/verify", get(journal_verify))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
