//! Billing entries (finalized invoices) read by the day close.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::settlement::PaymentChannel;
use crate::error::{ClinicError, ClinicResult};

/// Basis points in one whole (100%).
const BASIS_POINTS: i64 = 10_000;

/// Billing entry status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    /// Counted at day close
    Finalized,
    /// Cancelled after the fact, excluded from totals
    Void,
}

/// A single billed line (one procedure or product).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    /// Unit price in minor currency units
    pub unit_price_minor: i64,
    /// Tax rate in basis points (1800 = 18%)
    #[serde(default)]
    pub tax_rate_bp: u32,
}

impl InvoiceLine {
    /// `None` when the amount does not fit in minor units.
    pub fn subtotal_minor(&self) -> Option<i64> {
        self.unit_price_minor.checked_mul(i64::from(self.quantity))
    }

    /// Tax rounded half-up to minor units.
    pub fn tax_minor(&self) -> Option<i64> {
        self.subtotal_minor()?
            .checked_mul(i64::from(self.tax_rate_bp))?
            .checked_add(BASIS_POINTS / 2)
            .map(|scaled| scaled / BASIS_POINTS)
    }
}

/// Request to record a finalized invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceRequest {
    pub clinic_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub visit_id: Option<String>,
    pub payment_channel: PaymentChannel,
    pub lines: Vec<InvoiceLine>,
    /// Clinic-local billing date; defaults to today
    #[serde(default)]
    pub billed_on: Option<NaiveDate>,
}

/// A stored billing entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingEntry {
    pub billing_id: String,
    pub invoice_no: String,
    pub clinic_id: String,
    pub patient_id: String,
    pub visit_id: Option<String>,
    pub payment_channel: PaymentChannel,
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
    pub status: BillingStatus,
    pub is_verified: bool,
    pub billed_on: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    pub created_at: DateTime<Utc>,
}

impl BillingEntry {
    /// Build a finalized entry from a validated request.
    ///
    /// Fails with `Validation` when any amount overflows minor units.
    pub fn finalized(
        request: &InvoiceRequest,
        invoice_no: String,
        billed_on: NaiveDate,
        now: DateTime<Utc>,
    ) -> ClinicResult<Self> {
        let mut subtotal_minor: i64 = 0;
        let mut tax_minor: i64 = 0;
        for line in &request.lines {
            subtotal_minor = line
                .subtotal_minor()
                .and_then(|amount| subtotal_minor.checked_add(amount))
                .ok_or_else(overflow)?;
            tax_minor = line
                .tax_minor()
                .and_then(|amount| tax_minor.checked_add(amount))
                .ok_or_else(overflow)?;
        }
        let total_minor = subtotal_minor.checked_add(tax_minor).ok_or_else(overflow)?;

        Ok(Self {
            billing_id: uuid::Uuid::new_v4().to_string(),
            invoice_no,
            clinic_id: request.clinic_id.clone(),
            patient_id: request.patient_id.clone(),
            visit_id: request.visit_id.clone(),
            payment_channel: request.payment_channel,
            subtotal_minor,
            tax_minor,
            total_minor,
            status: BillingStatus::Finalized,
            is_verified: false,
            billed_on,
            lines: request.lines.clone(),
            created_at: now,
        })
    }
}

fn overflow() -> ClinicError {
    ClinicError::Validation("invoice amount overflows".into())
}

/// Aggregates over the finalized billing entries of one clinic-day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillingDayTotals {
    pub totals: super::ChannelTotals,
    pub entry_count: u32,
    pub distinct_visits: u32,
    pub line_items: u32,
}
