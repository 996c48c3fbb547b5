//! Day settlement database operations.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{ChannelTotals, DaySettlement, DaySummary, SettlementStatus, UnlockEvent};

impl Database {
    /// Get the settlement record of a clinic-day, if one was ever written.
    pub fn get_settlement(
        &self,
        clinic_id: &str,
        settlement_date: NaiveDate,
    ) -> DbResult<Option<DaySettlement>> {
        self.conn
            .query_row(
                r#"
                SELECT clinic_id, settlement_date, status, cash_total, card_total,
                       electronic_total, total_revenue, patient_count, procedure_count,
                       new_patient_count, follow_up_count, low_stock_items, closed_at,
                       closed_by, unlock_history, created_at, updated_at
                FROM day_settlements
                WHERE clinic_id = ?1 AND settlement_date = ?2
                "#,
                params![clinic_id, settlement_date],
                |row| {
                    Ok(SettlementRow {
                        clinic_id: row.get(0)?,
                        settlement_date: row.get(1)?,
                        status: row.get(2)?,
                        cash_total: row.get(3)?,
                        card_total: row.get(4)?,
                        electronic_total: row.get(5)?,
                        total_revenue: row.get(6)?,
                        patient_count: row.get(7)?,
                        procedure_count: row.get(8)?,
                        new_patient_count: row.get(9)?,
                        follow_up_count: row.get(10)?,
                        low_stock_items: row.get(11)?,
                        closed_at: row.get(12)?,
                        closed_by: row.get(13)?,
                        unlock_history: row.get(14)?,
                        created_at: row.get(15)?,
                        updated_at: row.get(16)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Create or overwrite the record for its clinic-day.
    pub fn upsert_settlement(&self, settlement: &DaySettlement) -> DbResult<()> {
        let summary = &settlement.summary;
        let low_stock_json = serde_json::to_string(&summary.low_stock_items)?;
        let unlock_json = serde_json::to_string(&settlement.unlock_history)?;

        self.conn.execute(
            r#"
            INSERT INTO day_settlements (
                clinic_id, settlement_date, status, cash_total, card_total,
                electronic_total, total_revenue, patient_count, procedure_count,
                new_patient_count, follow_up_count, low_stock_items, closed_at,
                closed_by, unlock_history, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(clinic_id, settlement_date) DO UPDATE SET
                status = excluded.status,
                cash_total = excluded.cash_total,
                card_total = excluded.card_total,
                electronic_total = excluded.electronic_total,
                total_revenue = excluded.total_revenue,
                patient_count = excluded.patient_count,
                procedure_count = excluded.procedure_count,
                new_patient_count = excluded.new_patient_count,
                follow_up_count = excluded.follow_up_count,
                low_stock_items = excluded.low_stock_items,
                closed_at = excluded.closed_at,
                closed_by = excluded.closed_by,
                unlock_history = excluded.unlock_history,
                updated_at = excluded.updated_at
            "#,
            params![
                settlement.clinic_id,
                settlement.settlement_date,
                status_to_string(settlement.status),
                summary.totals.cash,
                summary.totals.card,
                summary.totals.electronic,
                summary.total_revenue,
                summary.patient_count,
                summary.procedure_count,
                summary.new_patient_count,
                summary.follow_up_count,
                low_stock_json,
                settlement.closed_at,
                settlement.closed_by,
                unlock_json,
                settlement.created_at,
                settlement.updated_at,
            ],
        )?;
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct SettlementRow {
    clinic_id: String,
    settlement_date: NaiveDate,
    status: String,
    cash_total: i64,
    card_total: i64,
    electronic_total: i64,
    total_revenue: i64,
    patient_count: u32,
    procedure_count: u32,
    new_patient_count: u32,
    follow_up_count: u32,
    low_stock_items: String,
    closed_at: Option<DateTime<Utc>>,
    closed_by: Option<String>,
    unlock_history: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettlementRow> for DaySettlement {
    type Error = DbError;

    fn try_from(row: SettlementRow) -> Result<Self, Self::Error> {
        let low_stock_items: Vec<String> = serde_json::from_str(&row.low_stock_items)?;
        let unlock_history: Vec<UnlockEvent> = serde_json::from_str(&row.unlock_history)?;

        Ok(DaySettlement {
            clinic_id: row.clinic_id,
            settlement_date: row.settlement_date,
            status: string_to_status(&row.status)?,
            summary: DaySummary {
                totals: ChannelTotals {
                    cash: row.cash_total,
                    card: row.card_total,
                    electronic: row.electronic_total,
                },
                total_revenue: row.total_revenue,
                patient_count: row.patient_count,
                procedure_count: row.procedure_count,
                new_patient_count: row.new_patient_count,
                follow_up_count: row.follow_up_count,
                low_stock_items,
            },
            closed_at: row.closed_at,
            closed_by: row.closed_by,
            unlock_history,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_to_string(status: SettlementStatus) -> &'static str {
    match status {
        SettlementStatus::Open => "open",
        SettlementStatus::Closed => "closed",
    }
}

fn string_to_status(s: &str) -> Result<SettlementStatus, DbError> {
    match s {
        "open" => Ok(SettlementStatus::Open),
        "closed" => Ok(SettlementStatus::Closed),
        _ => Err(DbError::Constraint(format!("Unknown settlement status: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Clinic;
    use chrono::TimeZone;

    #[test]
    fn test_upsert_and_get() {
        let db = Database::open_in_memory().unwrap();
        db.insert_clinic(&Clinic::new("clinic-1", "Main", 330)).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap();

        assert!(db.get_settlement("clinic-1", date).unwrap().is_none());

        let mut record = DaySettlement::open("clinic-1".into(), date, now);
        let summary = DaySummary {
            totals: ChannelTotals {
                cash: 1500,
                card: 0,
                electronic: 2500,
            },
            total_revenue: 4000,
            patient_count: 3,
            procedure_count: 5,
            new_patient_count: 2,
            follow_up_count: 1,
            low_stock_items: vec!["Gloves".into()],
        };
        record.close(summary, "owner-1", now).unwrap();
        db.upsert_settlement(&record).unwrap();

        let stored = db.get_settlement("clinic-1", date).unwrap().unwrap();
        assert_eq!(stored, record);

        record.unlock("Late UPI payment", "owner-1", now).unwrap();
        db.upsert_settlement(&record).unwrap();

        let stored = db.get_settlement("clinic-1", date).unwrap().unwrap();
        assert_eq!(stored.status, SettlementStatus::Open);
        assert_eq!(stored.unlock_history.len(), 1);
        assert_eq!(stored.summary.total_revenue, 4000);
    }
}
