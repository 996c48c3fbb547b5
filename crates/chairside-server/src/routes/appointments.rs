use axum::extract::State;
use axum::Json;
use chairside_core::{CheckIn, QueueLedger, VisitEntry, VisitState, VisitType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInBody {
    pub patient_id: String,
    pub clinic_id: String,
    #[serde(default)]
    pub is_emergency: bool,
    #[serde(default)]
    pub visit_type: Option<VisitType>,
}

impl From<CheckInBody> for CheckIn {
    fn from(body: CheckInBody) -> Self {
        CheckIn {
            patient_id: body.patient_id,
            clinic_id: body.clinic_id,
            is_emergency: body.is_emergency,
            visit_type: body.visit_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    pub patient_id: String,
    pub clinic_id: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub visit_type: VisitType,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: VisitState,
}

/// Visit entry plus its estimated wait.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedVisit {
    #[serde(flatten)]
    pub visit: VisitEntry,
    pub estimated_wait_minutes: Option<u32>,
}

impl QueuedVisit {
    fn new(visit: VisitEntry, slot_minutes: u32) -> Self {
        let estimated_wait_minutes = visit.estimated_wait_minutes(slot_minutes);
        Self {
            visit,
            estimated_wait_minutes,
        }
    }
}

pub async fn check_in(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CheckInBody>,
) -> Result<Json<QueuedVisit>, ApiError> {
    let request = CheckIn::from(body);
    let visit = state
        .run_blocking(move |db, ctx| Ok(QueueLedger::new(db, ctx).check_in(&request)?))
        .await?;
    Ok(Json(QueuedVisit::new(visit, state.ctx.config.slot_minutes)))
}

pub async fn schedule(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ScheduleBody>,
) -> Result<Json<VisitEntry>, ApiError> {
    let visit = state
        .run_blocking(move |db, ctx| {
            Ok(QueueLedger::new(db, ctx).schedule(
                &body.patient_id,
                &body.clinic_id,
                body.starts_at,
                body.visit_type,
            )?)
        })
        .await?;
    Ok(Json(visit))
}

pub async fn queue(
    State(state): State<AppState>,
    ApiPath(clinic_id): ApiPath<String>,
) -> Result<Json<Vec<QueuedVisit>>, ApiError> {
    let visits = state
        .run_blocking(move |db, ctx| Ok(QueueLedger::new(db, ctx).active_queue(&clinic_id)?))
        .await?;
    let slot_minutes = state.ctx.config.slot_minutes;
    Ok(Json(
        visits
            .into_iter()
            .map(|visit| QueuedVisit::new(visit, slot_minutes))
            .collect(),
    ))
}

pub async fn advance_visit(
    State(state): State<AppState>,
    ApiPath(visit_id): ApiPath<String>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<VisitEntry>, ApiError> {
    let visit = state
        .run_blocking(move |db, ctx| Ok(QueueLedger::new(db, ctx).advance(&visit_id, body.status)?))
        .await?;
    Ok(Json(visit))
}
