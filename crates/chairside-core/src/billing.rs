//! Billing accumulator: finalized invoices of a clinic-day.
//!
//! Every financial mutation here runs the day-lock guard inside its own
//! exclusive transaction, so a concurrent close is seen either fully or not
//! at all.

use chrono::{Datelike, NaiveDate};
use log::info;

use crate::collaborators::Collaborators;
use crate::db::Database;
use crate::error::{require_id, ClinicError, ClinicResult};
use crate::models::{BillingDayTotals, BillingEntry, BillingStatus, InvoiceRequest};
use crate::queue::require_clinic;
use crate::settlement::ensure_day_open;
use crate::txn;

/// Highest accepted tax rate (100%).
const MAX_TAX_RATE_BP: u32 = 10_000;

/// Billing accumulator service.
pub struct BillingAccumulator<'a> {
    db: &'a Database,
    ctx: &'a Collaborators,
}

impl<'a> BillingAccumulator<'a> {
    pub fn new(db: &'a Database, ctx: &'a Collaborators) -> Self {
        Self { db, ctx }
    }

    /// Store a FINALIZED invoice against its clinic-local billing date.
    ///
    /// Fails with `DayLocked` when that day is closed.
    pub fn record_invoice(&self, request: &InvoiceRequest) -> ClinicResult<BillingEntry> {
        validate_request(request)?;

        let now = self.ctx.clock.now();
        let entry = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            let clinic = require_clinic(db, &request.clinic_id)?;
            if !db.patient_exists(&request.patient_id)? {
                return Err(ClinicError::NotFound(format!(
                    "patient {}",
                    request.patient_id
                )));
            }

            let today = clinic.local_date(now);
            let billed_on = request.billed_on.unwrap_or(today);
            if billed_on > today {
                return Err(ClinicError::Validation(format!(
                    "billing date {} is in the future",
                    billed_on
                )));
            }

            if let Some(visit_id) = &request.visit_id {
                let visit = db
                    .get_visit(visit_id)?
                    .ok_or_else(|| ClinicError::NotFound(format!("visit {}", visit_id)))?;
                if visit.clinic_id != request.clinic_id || visit.patient_id != request.patient_id {
                    return Err(ClinicError::Validation(format!(
                        "visit {} belongs to another clinic or patient",
                        visit_id
                    )));
                }
            }

            ensure_day_open(db, &request.clinic_id, billed_on)?;

            let year = billed_on.year();
            let sequence = db.max_invoice_sequence(&request.clinic_id, year)? + 1;
            let invoice_no = format!("INV-{}-{:03}", year, sequence);
            let entry = BillingEntry::finalized(request, invoice_no, billed_on, now)?;

            // The day must stay summable at close.
            let day = db.finalized_day_totals(&request.clinic_id, billed_on)?;
            if day
                .totals
                .checked_add(entry.payment_channel, entry.total_minor)
                .and_then(|totals| totals.checked_total())
                .is_none()
            {
                return Err(ClinicError::Validation(format!(
                    "day total for {} on {} would overflow",
                    request.clinic_id, billed_on
                )));
            }
            db.insert_billing_entry(&entry)?;
            Ok(entry)
        })?;

        info!(
            "Recorded {} for clinic {} on {}: {} ({:?})",
            entry.invoice_no,
            entry.clinic_id,
            entry.billed_on,
            entry.total_minor,
            entry.payment_channel
        );
        Ok(entry)
    }

    /// All billing entries (finalized and void) of a clinic-day.
    pub fn daily_transactions(&self, clinic_id: &str, date: NaiveDate) -> ClinicResult<Vec<BillingEntry>> {
        require_id(clinic_id, "clinic_id")?;
        require_clinic(self.db, clinic_id)?;
        Ok(self.db.list_billing_entries(clinic_id, date)?)
    }

    /// Set the audit flag. Not a financial mutation, so closed days allow it.
    pub fn verify_transaction(&self, billing_id: &str) -> ClinicResult<BillingEntry> {
        require_id(billing_id, "billing_id")?;
        let entry = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            if !db.mark_billing_verified(billing_id)? {
                return Err(ClinicError::NotFound(format!("billing entry {}", billing_id)));
            }
            db.get_billing_entry(billing_id)?
                .ok_or_else(|| ClinicError::NotFound(format!("billing entry {}", billing_id)))
        })?;
        info!("Verified {}", entry.invoice_no);
        Ok(entry)
    }

    /// Void an entry so it no longer counts toward day totals.
    pub fn void_invoice(&self, billing_id: &str) -> ClinicResult<BillingEntry> {
        require_id(billing_id, "billing_id")?;
        let entry = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            let mut entry = db
                .get_billing_entry(billing_id)?
                .ok_or_else(|| ClinicError::NotFound(format!("billing entry {}", billing_id)))?;
            if entry.status == BillingStatus::Void {
                return Ok(entry);
            }
            ensure_day_open(db, &entry.clinic_id, entry.billed_on)?;
            db.set_billing_status(billing_id, BillingStatus::Void)?;
            entry.status = BillingStatus::Void;
            Ok(entry)
        })?;
        info!("Voided {} for clinic {}", entry.invoice_no, entry.clinic_id);
        Ok(entry)
    }

    /// Channel totals and counts over the FINALIZED entries of a clinic-day.
    pub fn day_totals(&self, clinic_id: &str, date: NaiveDate) -> ClinicResult<BillingDayTotals> {
        Ok(self.db.finalized_day_totals(clinic_id, date)?)
    }
}

fn validate_request(request: &InvoiceRequest) -> ClinicResult<()> {
    require_id(&request.clinic_id, "clinic_id")?;
    require_id(&request.patient_id, "patient_id")?;
    if request.lines.is_empty() {
        return Err(ClinicError::Validation("invoice has no lines".into()));
    }
    for (index, line) in request.lines.iter().enumerate() {
        if line.description.trim().is_empty() {
            return Err(ClinicError::Validation(format!("line {} has no description", index + 1)));
        }
        if line.quantity == 0 {
            return Err(ClinicError::Validation(format!("line {} has zero quantity", index + 1)));
        }
        if line.unit_price_minor < 0 {
            return Err(ClinicError::Validation(format!("line {} has a negative price", index + 1)));
        }
        if line.tax_rate_bp > MAX_TAX_RATE_BP {
            return Err(ClinicError::Validation(format!(
                "line {} tax rate {} exceeds {} basis points",
                index + 1,
                line.tax_rate_bp,
                MAX_TAX_RATE_BP
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Clinic, InvoiceLine, Patient, PaymentChannel};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Database, Collaborators, String) {
        let db = Database::open_in_memory().unwrap();
        db.insert_clinic(&Clinic::new("clinic-1", "Main", 330)).unwrap();
        let patient = Patient::new("Asha".into());
        db.insert_patient(&patient).unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap()));
        let ctx = Collaborators::default().with_clock(clock);
        (db, ctx, patient.patient_id)
    }

    fn request(patient_id: &str, channel: PaymentChannel) -> InvoiceRequest {
        InvoiceRequest {
            clinic_id: "clinic-1".into(),
            patient_id: patient_id.into(),
            visit_id: None,
            payment_channel: channel,
            lines: vec![InvoiceLine {
                description: "Root canal".into(),
                quantity: 1,
                unit_price_minor: 450_000,
                tax_rate_bp: 1800,
            }],
            billed_on: None,
        }
    }

    #[test]
    fn test_invoice_numbers_increase_per_clinic_year() {
        let (db, ctx, patient_id) = setup();
        let billing = BillingAccumulator::new(&db, &ctx);

        let first = billing.record_invoice(&request(&patient_id, PaymentChannel::Cash)).unwrap();
        let second = billing.record_invoice(&request(&patient_id, PaymentChannel::Card)).unwrap();
        assert_eq!(first.invoice_no, "INV-2024-001");
        assert_eq!(second.invoice_no, "INV-2024-002");
        assert_eq!(first.total_minor, 531_000);
        assert_eq!(first.billed_on, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn test_validation_errors() {
        let (db, ctx, patient_id) = setup();
        let billing = BillingAccumulator::new(&db, &ctx);

        let mut empty = request(&patient_id, PaymentChannel::Cash);
        empty.lines.clear();
        assert!(matches!(billing.record_invoice(&empty), Err(ClinicError::Validation(_))));

        let mut zero = request(&patient_id, PaymentChannel::Cash);
        zero.lines[0].quantity = 0;
        assert!(matches!(billing.record_invoice(&zero), Err(ClinicError::Validation(_))));

        let mut future = request(&patient_id, PaymentChannel::Cash);
        future.billed_on = Some(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + Duration::days(1));
        assert!(matches!(billing.record_invoice(&future), Err(ClinicError::Validation(_))));

        let mut unknown_visit = request(&patient_id, PaymentChannel::Cash);
        unknown_visit.visit_id = Some("missing".into());
        assert!(matches!(billing.record_invoice(&unknown_visit), Err(ClinicError::NotFound(_))));

        assert!(billing.daily_transactions("clinic-1", NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_void_excludes_from_totals() {
        let (db, ctx, patient_id) = setup();
        let billing = BillingAccumulator::new(&db, &ctx);
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let kept = billing.record_invoice(&request(&patient_id, PaymentChannel::Cash)).unwrap();
        let voided = billing.record_invoice(&request(&patient_id, PaymentChannel::Card)).unwrap();
        billing.void_invoice(&voided.billing_id).unwrap();
        // Voiding twice is harmless
        billing.void_invoice(&voided.billing_id).unwrap();

        let totals = billing.day_totals("clinic-1", day).unwrap();
        assert_eq!(totals.totals.cash, kept.total_minor);
        assert_eq!(totals.totals.card, 0);
        assert_eq!(totals.entry_count, 1);
        assert_eq!(billing.daily_transactions("clinic-1", day).unwrap().len(), 2);
    }

    #[test]
    fn test_verify_transaction() {
        let (db, ctx, patient_id) = setup();
        let billing = BillingAccumulator::new(&db, &ctx);
        let entry = billing.record_invoice(&request(&patient_id, PaymentChannel::Electronic)).unwrap();

        assert!(billing.verify_transaction(&entry.billing_id).unwrap().is_verified);
        assert!(matches!(
            billing.verify_transaction("missing"),
            Err(ClinicError::NotFound(_))
        ));
    }
}
