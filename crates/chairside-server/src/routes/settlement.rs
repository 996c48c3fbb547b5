use axum::extract::State;
use axum::Json;
use chairside_core::{
    BillingAccumulator, BillingEntry, DaySettlement, JournalVerification, SettlementEngine,
    SettlementStatus,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseBody {
    pub date: NaiveDate,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockBody {
    pub date: NaiveDate,
    pub reason: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

/// Status of a clinic-day; `settlement` is null until the first close.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: SettlementStatus,
    pub settlement: Option<DaySettlement>,
}

pub async fn close_day(
    State(state): State<AppState>,
    ApiPath(clinic_id): ApiPath<String>,
    ApiJson(body): ApiJson<CloseBody>,
) -> Result<Json<DaySettlement>, ApiError> {
    let record = state
        .run_blocking(move |db, ctx| {
            Ok(SettlementEngine::new(db, ctx).close_day(&clinic_id, body.date, &body.user_id)?)
        })
        .await?;
    Ok(Json(record))
}

pub async fn unlock_day(
    State(state): State<AppState>,
    ApiPath(clinic_id): ApiPath<String>,
    ApiJson(body): ApiJson<UnlockBody>,
) -> Result<Json<DaySettlement>, ApiError> {
    let record = state
        .run_blocking(move |db, ctx| {
            Ok(SettlementEngine::new(db, ctx).unlock_day(
                &clinic_id,
                body.date,
                &body.reason,
                &body.user_id,
            )?)
        })
        .await?;
    Ok(Json(record))
}

pub async fn settlement_status(
    State(state): State<AppState>,
    ApiPath(clinic_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let settlement = state
        .run_blocking(move |db, ctx| Ok(SettlementEngine::new(db, ctx).status(&clinic_id, query.date)?))
        .await?;
    let status = settlement
        .as_ref()
        .map(|record| record.status)
        .unwrap_or(SettlementStatus::Open);
    Ok(Json(StatusResponse { status, settlement }))
}

pub async fn daily_transactions(
    State(state): State<AppState>,
    ApiPath(clinic_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<Json<Vec<BillingEntry>>, ApiError> {
    let entries = state
        .run_blocking(move |db, ctx| {
            Ok(BillingAccumulator::new(db, ctx).daily_transactions(&clinic_id, query.date)?)
        })
        .await?;
    Ok(Json(entries))
}

pub async fn verify_transaction(
    State(state): State<AppState>,
    ApiPath(billing_id): ApiPath<String>,
) -> Result<Json<BillingEntry>, ApiError> {
    let entry = state
        .run_blocking(move |db, ctx| Ok(BillingAccumulator::new(db, ctx).verify_transaction(&billing_id)?))
        .await?;
    Ok(Json(entry))
}

pub async fn journal_verify(
    State(state): State<AppState>,
) -> Result<Json<JournalVerification>, ApiError> {
    let report = state
        .run_blocking(|db, ctx| Ok(SettlementEngine::new(db, ctx).verify_journal()?))
        .await?;
    if !report.valid {
        log::warn!(
            "Settlement journal broken at seq {:?}",
            report.first_broken_seq
        );
    }
    Ok(Json(report))
}
