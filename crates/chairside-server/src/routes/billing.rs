use axum::extract::State;
use axum::Json;
use chairside_core::{BillingAccumulator, BillingEntry, InvoiceLine, InvoiceRequest, PaymentChannel};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineBody {
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub unit_price_minor: i64,
    #[serde(default)]
    pub tax_rate_bp: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceBody {
    pub clinic_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub visit_id: Option<String>,
    pub payment_channel: PaymentChannel,
    pub lines: Vec<InvoiceLineBody>,
    #[serde(default)]
    pub billed_on: Option<NaiveDate>,
}

impl From<InvoiceBody> for InvoiceRequest {
    fn from(body: InvoiceBody) -> Self {
        InvoiceRequest {
            clinic_id: body.clinic_id,
            patient_id: body.patient_id,
            visit_id: body.visit_id,
            payment_channel: body.payment_channel,
            lines: body
                .lines
                .into_iter()
                .map(|line| InvoiceLine {
                    description: line.description,
                    quantity: line.quantity,
                    unit_price_minor: line.unit_price_minor,
                    tax_rate_bp: line.tax_rate_bp,
                })
                .collect(),
            billed_on: body.billed_on,
        }
    }
}

pub async fn record_invoice(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<InvoiceBody>,
) -> Result<Json<BillingEntry>, ApiError> {
    let request = InvoiceRequest::from(body);
    let entry = state
        .run_blocking(move |db, ctx| Ok(BillingAccumulator::new(db, ctx).record_invoice(&request)?))
        .await?;
    Ok(Json(entry))
}
