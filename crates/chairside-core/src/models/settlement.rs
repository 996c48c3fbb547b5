//! Day settlement models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, ClinicResult};

/// Settlement status of a clinic-day. No record means OPEN.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    #[default]
    Open,
    Closed,
}

/// Payment channel of a billing entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentChannel {
    Cash,
    Card,
    /// UPI, bank transfer and other electronic rails
    #[serde(alias = "UPI")]
    Electronic,
}

/// Totals per payment channel, in minor currency units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelTotals {
    pub cash: i64,
    pub card: i64,
    pub electronic: i64,
}

impl ChannelTotals {
    /// Add `amount` to one channel; `None` on overflow.
    pub fn checked_add(self, channel: PaymentChannel, amount: i64) -> Option<Self> {
        let mut totals = self;
        let slot = match channel {
            PaymentChannel::Cash => &mut totals.cash,
            PaymentChannel::Card => &mut totals.card,
            PaymentChannel::Electronic => &mut totals.electronic,
        };
        *slot = slot.checked_add(amount)?;
        Some(totals)
    }

    pub fn get(&self, channel: PaymentChannel) -> i64 {
        match channel {
            PaymentChannel::Cash => self.cash,
            PaymentChannel::Card => self.card,
            PaymentChannel::Electronic => self.electronic,
        }
    }

    /// Sum over all channels; `None` on overflow.
    pub fn checked_total(&self) -> Option<i64> {
        self.cash.checked_add(self.card)?.checked_add(self.electronic)
    }
}

/// One reopening of a closed day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlockEvent {
    pub reason: String,
    pub unlocked_at: DateTime<Utc>,
    pub unlocked_by: String,
}

/// Aggregates computed when a day is closed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DaySummary {
    pub totals: ChannelTotals,
    /// Always `totals.checked_total()`
    pub total_revenue: i64,
    /// Distinct visits referenced by finalized billing entries
    pub patient_count: u32,
    /// Billed line items across finalized entries
    pub procedure_count: u32,
    pub new_patient_count: u32,
    pub follow_up_count: u32,
    /// Inventory items at or below minimum stock at close time
    pub low_stock_items: Vec<String>,
}

/// Settlement record for one clinic-day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySettlement {
    pub clinic_id: String,
    pub settlement_date: NaiveDate,
    pub status: SettlementStatus,
    pub summary: DaySummary,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub unlock_history: Vec<UnlockEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DaySettlement {
    /// Fresh OPEN record with an empty summary.
    pub fn open(clinic_id: String, settlement_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            clinic_id,
            settlement_date,
            status: SettlementStatus::Open,
            summary: DaySummary::default(),
            closed_at: None,
            closed_by: None,
            unlock_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == SettlementStatus::Closed
    }

    /// OPEN → CLOSED, replacing the live summary.
    pub fn close(
        &mut self,
        summary: DaySummary,
        operator_id: &str,
        now: DateTime<Utc>,
    ) -> ClinicResult<()> {
        if self.is_closed() {
            return Err(ClinicError::AlreadyClosed {
                clinic_id: self.clinic_id.clone(),
                date: self.settlement_date,
            });
        }
        self.summary = summary;
        self.status = SettlementStatus::Closed;
        self.closed_at = Some(now);
        self.closed_by = Some(operator_id.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// CLOSED → OPEN, appending to the unlock history.
    ///
    /// An already open day is rejected with `Validation` so that every
    /// history entry corresponds to a real reopening. The summary is kept
    /// until the next close.
    pub fn unlock(&mut self, reason: &str, operator_id: &str, now: DateTime<Utc>) -> ClinicResult<()> {
        if !self.is_closed() {
            return Err(ClinicError::Validation(format!(
                "day {} is not closed for clinic {}",
                self.settlement_date, self.clinic_id
            )));
        }
        self.status = SettlementStatus::Open;
        self.unlock_history.push(UnlockEvent {
            reason: reason.to_string(),
            unlocked_at: now,
            unlocked_by: operator_id.to_string(),
        });
        self.updated_at = now;
        Ok(())
    }
}
