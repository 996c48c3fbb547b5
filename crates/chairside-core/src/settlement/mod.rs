//! Settlement engine: day close, unlock and the day-lock guard.
//!
//! ```text
//!   (no record) ──close──▶ CLOSED ──unlock──▶ OPEN ──close──▶ CLOSED …
//! ```
//!
//! A missing record means OPEN. Records are created by the first close and
//! never deleted. Every close and unlock is also appended to the
//! hash-chained [`journal`].

mod digest;
pub mod journal;

pub use digest::{format_minor, owner_digest};
pub use journal::{hash_data, JournalEvent, JournalPayload, JournalVerification, GENESIS_HASH};

use chrono::NaiveDate;
use log::{debug, info};

use crate::collaborators::Collaborators;
use crate::db::{Database, JournalRow};
use crate::error::{require_id, ClinicError, ClinicResult};
use crate::models::{DaySettlement, DaySummary, StaffRole};
use crate::notify::{self, NotifyTarget};
use crate::queue::require_clinic;
use crate::txn;

/// Fail with `DayLocked` when the clinic-day has a CLOSED record.
///
/// Call inside the transaction that performs the financial mutation.
pub(crate) fn ensure_day_open(db: &Database, clinic_id: &str, date: NaiveDate) -> ClinicResult<()> {
    match db.get_settlement(clinic_id, date)? {
        Some(record) if record.is_closed() => Err(ClinicError::DayLocked {
            clinic_id: clinic_id.to_string(),
            date,
        }),
        _ => Ok(()),
    }
}

/// Settlement engine service.
pub struct SettlementEngine<'a> {
    db: &'a Database,
    ctx: &'a Collaborators,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(db: &'a Database, ctx: &'a Collaborators) -> Self {
        Self { db, ctx }
    }

    /// Close a clinic-day: aggregate its finalized billing, snapshot low
    /// stock, lock the day and notify the owner.
    ///
    /// Fails with `AlreadyClosed` if the day is already closed. After an
    /// unlock the summary is recomputed from current data.
    pub fn close_day(
        &self,
        clinic_id: &str,
        date: NaiveDate,
        operator_id: &str,
    ) -> ClinicResult<DaySettlement> {
        require_id(clinic_id, "clinic_id")?;
        require_id(operator_id, "operator_id")?;

        let now = self.ctx.clock.now();
        let record = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            let clinic = require_clinic(db, clinic_id)?;
            if date > clinic.local_date(now) {
                return Err(ClinicError::Validation(format!(
                    "cannot close future day {}",
                    date
                )));
            }

            let mut record = db
                .get_settlement(clinic_id, date)?
                .unwrap_or_else(|| DaySettlement::open(clinic_id.to_string(), date, now));
            if record.is_closed() {
                return Err(ClinicError::AlreadyClosed {
                    clinic_id: clinic_id.to_string(),
                    date,
                });
            }

            let summary = summarize(db, clinic_id, date)?;
            record.close(summary, operator_id, now)?;
            db.upsert_settlement(&record)?;
            journal::append(db, &record, JournalEvent::Closed, operator_id, None, now)?;
            Ok(record)
        })?;

        info!(
            "Closed {} for clinic {} by {}: revenue {}",
            date, clinic_id, operator_id, record.summary.total_revenue
        );
        notify::deliver(
            self.ctx.notifier.as_ref(),
            NotifyTarget::staff(clinic_id, StaffRole::Owner),
            "Day closed",
            owner_digest(&record),
        );
        Ok(record)
    }

    /// Reopen a closed day, recording who did it and why.
    ///
    /// Fails with `NotFound` when the day was never closed and with
    /// `Validation` when it is currently open.
    pub fn unlock_day(
        &self,
        clinic_id: &str,
        date: NaiveDate,
        reason: &str,
        operator_id: &str,
    ) -> ClinicResult<DaySettlement> {
        require_id(clinic_id, "clinic_id")?;
        require_id(operator_id, "operator_id")?;
        if reason.trim().is_empty() {
            return Err(ClinicError::Validation("unlock reason is required".into()));
        }

        let now = self.ctx.clock.now();
        let record = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            let mut record = db.get_settlement(clinic_id, date)?.ok_or_else(|| {
                ClinicError::NotFound(format!("settlement for {} on {}", clinic_id, date))
            })?;
            record.unlock(reason, operator_id, now)?;
            db.upsert_settlement(&record)?;
            journal::append(db, &record, JournalEvent::Unlocked, operator_id, Some(reason), now)?;
            Ok(record)
        })?;

        info!(
            "Unlocked {} for clinic {} by {}: {}",
            date, clinic_id, operator_id, reason
        );
        Ok(record)
    }

    /// Guard for financial mutations: `DayLocked` when the day is closed.
    pub fn check_lock(&self, clinic_id: &str, date: NaiveDate) -> ClinicResult<()> {
        ensure_day_open(self.db, clinic_id, date)
    }

    /// Settlement record of a clinic-day; `None` means open.
    pub fn status(&self, clinic_id: &str, date: NaiveDate) -> ClinicResult<Option<DaySettlement>> {
        require_id(clinic_id, "clinic_id")?;
        Ok(self.db.get_settlement(clinic_id, date)?)
    }

    /// Journal entries of one clinic-day in append order.
    pub fn history(&self, clinic_id: &str, date: NaiveDate) -> ClinicResult<Vec<JournalRow>> {
        Ok(self.db.list_journal_for_day(clinic_id, date)?)
    }

    /// Re-walk the settlement journal.
    pub fn verify_journal(&self) -> ClinicResult<JournalVerification> {
        journal::verify(self.db)
    }
}

fn summarize(db: &Database, clinic_id: &str, date: NaiveDate) -> ClinicResult<DaySummary> {
    let billing = db.finalized_day_totals(clinic_id, date)?;
    let (new_patient_count, follow_up_count) = db.count_visits_by_type(clinic_id, date)?;
    let low_stock_items = db.low_stock_items(clinic_id)?;
    debug!(
        "Summary for clinic {} on {}: {:?} over {} entries",
        clinic_id, date, billing.totals, billing.entry_count
    );

    let total_revenue = billing.totals.checked_total().ok_or_else(|| {
        ClinicError::Validation(format!(
            "revenue for clinic {} on {} overflows",
            clinic_id, date
        ))
    })?;

    Ok(DaySummary {
        totals: billing.totals,
        total_revenue,
        patient_count: billing.distinct_visits,
        procedure_count: billing.line_items,
        new_patient_count,
        follow_up_count,
        low_stock_items,
    })
}
