//! Billing entry database operations.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{
    BillingDayTotals, BillingEntry, BillingStatus, ChannelTotals, InvoiceLine, PaymentChannel,
};

const BILLING_COLUMNS: &str = r#"
    billing_id, invoice_no, clinic_id, patient_id, visit_id, payment_channel,
    subtotal_minor, tax_minor, total_minor, status, is_verified, billed_on, created_at
"#;

impl Database {
    /// Insert a billing entry together with its line items.
    pub fn insert_billing_entry(&self, entry: &BillingEntry) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO billing_entries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                BILLING_COLUMNS
            ),
            params![
                entry.billing_id,
                entry.invoice_no,
                entry.clinic_id,
                entry.patient_id,
                entry.visit_id,
                channel_to_string(entry.payment_channel),
                entry.subtotal_minor,
                entry.tax_minor,
                entry.total_minor,
                status_to_string(entry.status),
                entry.is_verified,
                entry.billed_on,
                entry.created_at,
            ],
        )?;

        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO billing_line_items (
                billing_id, line_no, description, quantity, unit_price_minor, tax_rate_bp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for (line_no, line) in entry.lines.iter().enumerate() {
            stmt.execute(params![
                entry.billing_id,
                line_no as i64,
                line.description,
                line.quantity,
                line.unit_price_minor,
                line.tax_rate_bp,
            ])?;
        }
        Ok(())
    }

    /// Get a billing entry (with lines) by ID.
    pub fn get_billing_entry(&self, billing_id: &str) -> DbResult<Option<BillingEntry>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM billing_entries WHERE billing_id = ?", BILLING_COLUMNS),
                [billing_id],
                billing_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let lines = self.billing_lines(&row.billing_id)?;
                Ok(Some(row.into_entry(lines)?))
            }
            None => Ok(None),
        }
    }

    /// All billing entries (any status) for a clinic-day, oldest first.
    pub fn list_billing_entries(
        &self,
        clinic_id: &str,
        billed_on: NaiveDate,
    ) -> DbResult<Vec<BillingEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM billing_entries
            WHERE clinic_id = ?1 AND billed_on = ?2
            ORDER BY created_at, invoice_no
            "#,
            BILLING_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![clinic_id, billed_on], billing_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.billing_lines(&row.billing_id)?;
            entries.push(row.into_entry(lines)?);
        }
        Ok(entries)
    }

    /// Highest invoice sequence number issued by a clinic in `year`.
    pub fn max_invoice_sequence(&self, clinic_id: &str, year: i32) -> DbResult<u32> {
        let prefix = format!("INV-{}-", year);
        let max: Option<i64> = self.conn.query_row(
            r#"
            SELECT MAX(CAST(substr(invoice_no, ?3) AS INTEGER))
            FROM billing_entries
            WHERE clinic_id = ?1 AND invoice_no LIKE ?2 || '%'
            "#,
            params![clinic_id, prefix, prefix.len() as i64 + 1],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0).max(0) as u32)
    }

    /// Set the audit flag on an entry.
    pub fn mark_billing_verified(&self, billing_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE billing_entries SET is_verified = 1 WHERE billing_id = ?",
            [billing_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Change an entry's status.
    pub fn set_billing_status(&self, billing_id: &str, status: BillingStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE billing_entries SET status = ?2 WHERE billing_id = ?1",
            params![billing_id, status_to_string(status)],
        )?;
        Ok(rows_affected > 0)
    }

    /// Aggregate the FINALIZED entries of a clinic-day.
    ///
    /// Distinct visits fall back to the patient for entries billed without a
    /// visit reference.
    pub fn finalized_day_totals(
        &self,
        clinic_id: &str,
        billed_on: NaiveDate,
    ) -> DbResult<BillingDayTotals> {
        let mut totals = ChannelTotals::default();
        let mut stmt = self.conn.prepare(
            r#"
            SELECT payment_channel, COALESCE(SUM(total_minor), 0)
            FROM billing_entries
            WHERE clinic_id = ?1 AND billed_on = ?2 AND status = 'finalized'
            GROUP BY payment_channel
            "#,
        )?;
        let rows = stmt.query_map(params![clinic_id, billed_on], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (channel, amount) = row?;
            totals = totals
                .checked_add(string_to_channel(&channel)?, amount)
                .ok_or_else(|| DbError::Constraint(format!("{} total overflows", channel)))?;
        }

        let (entry_count, distinct_visits, line_items) = self.conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COUNT(DISTINCT COALESCE(visit_id, 'patient:' || patient_id)),
                COALESCE(SUM((SELECT COUNT(*) FROM billing_line_items l
                              WHERE l.billing_id = b.billing_id)), 0)
            FROM billing_entries b
            WHERE clinic_id = ?1 AND billed_on = ?2 AND status = 'finalized'
            "#,
            params![clinic_id, billed_on],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(BillingDayTotals {
            totals,
            entry_count,
            distinct_visits,
            line_items,
        })
    }

    fn billing_lines(&self, billing_id: &str) -> DbResult<Vec<InvoiceLine>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT description, quantity, unit_price_minor, tax_rate_bp
            FROM billing_line_items
            WHERE billing_id = ?
            ORDER BY line_no
            "#,
        )?;
        let rows = stmt.query_map([billing_id], |row| {
            Ok(InvoiceLine {
                description: row.get(0)?,
                quantity: row.get(1)?,
                unit_price_minor: row.get(2)?,
                tax_rate_bp: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn billing_row(row: &Row<'_>) -> rusqlite::Result<BillingRow> {
    Ok(BillingRow {
        billing_id: row.get(0)?,
        invoice_no: row.get(1)?,
        clinic_id: row.get(2)?,
        patient_id: row.get(3)?,
        visit_id: row.get(4)?,
        payment_channel: row.get(5)?,
        subtotal_minor: row.get(6)?,
        tax_minor: row.get(7)?,
        total_minor: row.get(8)?,
        status: row.get(9)?,
        is_verified: row.get(10)?,
        billed_on: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Intermediate row struct for database mapping.
struct BillingRow {
    billing_id: String,
    invoice_no: String,
    clinic_id: String,
    patient_id: String,
    visit_id: Option<String>,
    payment_channel: String,
    subtotal_minor: i64,
    tax_minor: i64,
    total_minor: i64,
    status: String,
    is_verified: bool,
    billed_on: NaiveDate,
    created_at: DateTime<Utc>,
}

impl BillingRow {
    fn into_entry(self, lines: Vec<InvoiceLine>) -> DbResult<BillingEntry> {
        Ok(BillingEntry {
            billing_id: self.billing_id,
            invoice_no: self.invoice_no,
            clinic_id: self.clinic_id,
            patient_id: self.patient_id,
            visit_id: self.visit_id,
            payment_channel: string_to_channel(&self.payment_channel)?,
            subtotal_minor: self.subtotal_minor,
            tax_minor: self.tax_minor,
            total_minor: self.total_minor,
            status: string_to_status(&self.status)?,
            is_verified: self.is_verified,
            billed_on: self.billed_on,
            lines,
            created_at: self.created_at,
        })
    }
}

fn channel_to_string(channel: PaymentChannel) -> &'static str {
    match channel {
        PaymentChannel::Cash => "cash",
        PaymentChannel::Card => "card",
        PaymentChannel::Electronic => "electronic",
    }
}

fn string_to_channel(s: &str) -> Result<PaymentChannel, DbError> {
    match s {
        "cash" => Ok(PaymentChannel::Cash),
        "card" => Ok(PaymentChannel::Card),
        "electronic" => Ok(PaymentChannel::Electronic),
        _ => Err(DbError::Constraint(format!("Unknown payment channel: {}", s))),
    }
}

fn status_to_string(status: BillingStatus) -> &'static str {
    match status {
        BillingStatus::Finalized => "finalized",
        BillingStatus::Void => "void",
    }
}

fn string_to_status(s: &str) -> Result<BillingStatus, DbError> {
    match s {
        "finalized" => Ok(BillingStatus::Finalized),
        "void" => Ok(BillingStatus::Void),
        _ => Err(DbError::Constraint(format!("Unknown billing status: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Clinic, InvoiceRequest, Patient};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        db.insert_clinic(&Clinic::new("clinic-1", "Main", 330)).unwrap();
        let patient = Patient::new("Asha".into());
        db.insert_patient(&patient).unwrap();
        (db, patient.patient_id)
    }

    fn entry(patient_id: &str, seq: u32, channel: PaymentChannel, price: i64, lines: usize) -> BillingEntry {
        let request = InvoiceRequest {
            clinic_id: "clinic-1".into(),
            patient_id: patient_id.into(),
            visit_id: None,
            payment_channel: channel,
            lines: (0..lines)
                .map(|i| InvoiceLine {
                    description: format!("Procedure {}", i),
                    quantity: 1,
                    unit_price_minor: price,
                    tax_rate_bp: 0,
                })
                .collect(),
            billed_on: Some(day()),
        };
        BillingEntry::finalized(&request, format!("INV-2024-{:03}", seq), day(), Utc::now()).unwrap()
    }

    #[test]
    fn test_insert_and_get_with_lines() {
        let (db, patient_id) = setup_db();
        let stored = entry(&patient_id, 1, PaymentChannel::Cash, 500, 2);
        db.insert_billing_entry(&stored).unwrap();

        let retrieved = db.get_billing_entry(&stored.billing_id).unwrap().unwrap();
        assert_eq!(retrieved.invoice_no, "INV-2024-001");
        assert_eq!(retrieved.lines.len(), 2);
        assert_eq!(retrieved.lines[1].description, "Procedure 1");
        assert_eq!(retrieved.total_minor, 1000);
    }

    #[test]
    fn test_invoice_number_unique_per_clinic() {
        let (db, patient_id) = setup_db();
        db.insert_billing_entry(&entry(&patient_id, 1, PaymentChannel::Cash, 500, 1))
            .unwrap();
        let duplicate = entry(&patient_id, 1, PaymentChannel::Card, 700, 1);
        assert!(db.insert_billing_entry(&duplicate).is_err());
    }

    #[test]
    fn test_max_invoice_sequence() {
        let (db, patient_id) = setup_db();
        assert_eq!(db.max_invoice_sequence("clinic-1", 2024).unwrap(), 0);
        db.insert_billing_entry(&entry(&patient_id, 1, PaymentChannel::Cash, 500, 1))
            .unwrap();
        db.insert_billing_entry(&entry(&patient_id, 12, PaymentChannel::Cash, 500, 1))
            .unwrap();
        assert_eq!(db.max_invoice_sequence("clinic-1", 2024).unwrap(), 12);
        assert_eq!(db.max_invoice_sequence("clinic-1", 2025).unwrap(), 0);
    }

    #[test]
    fn test_finalized_day_totals_skip_void() {
        let (db, patient_id) = setup_db();
        let cash = entry(&patient_id, 1, PaymentChannel::Cash, 500, 2);
        let card = entry(&patient_id, 2, PaymentChannel::Card, 800, 1);
        let voided = entry(&patient_id, 3, PaymentChannel::Electronic, 999, 1);
        for e in [&cash, &card, &voided] {
            db.insert_billing_entry(e).unwrap();
        }
        assert!(db.set_billing_status(&voided.billing_id, BillingStatus::Void).unwrap());

        let totals = db.finalized_day_totals("clinic-1", day()).unwrap();
        assert_eq!(totals.totals.cash, 1000);
        assert_eq!(totals.totals.card, 800);
        assert_eq!(totals.totals.electronic, 0);
        assert_eq!(totals.entry_count, 2);
        assert_eq!(totals.line_items, 3);
        // No visit references: counted once per patient
        assert_eq!(totals.distinct_visits, 1);

        assert_eq!(db.list_billing_entries("clinic-1", day()).unwrap().len(), 3);
    }

    #[test]
    fn test_mark_verified() {
        let (db, patient_id) = setup_db();
        let stored = entry(&patient_id, 1, PaymentChannel::Cash, 500, 1);
        db.insert_billing_entry(&stored).unwrap();

        assert!(db.mark_billing_verified(&stored.billing_id).unwrap());
        assert!(!db.mark_billing_verified("missing").unwrap());
        let retrieved = db.get_billing_entry(&stored.billing_id).unwrap().unwrap();
        assert!(retrieved.is_verified);
    }
}
