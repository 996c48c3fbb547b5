//! Settlement journal storage (append-only).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

/// One stored journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRow {
    pub seq: i64,
    pub entry_id: String,
    pub clinic_id: String,
    pub settlement_date: NaiveDate,
    pub event: String,
    pub payload: String,
    pub prev_hash: String,
    pub entry_hash: String,
    pub recorded_at: DateTime<Utc>,
}

impl Database {
    /// Append an entry. Returns its sequence number.
    #[allow(clippy::too_many_arguments)]
    pub fn append_journal_entry(
        &self,
        entry_id: &str,
        clinic_id: &str,
        settlement_date: NaiveDate,
        event: &str,
        payload: &str,
        prev_hash: &str,
        entry_hash: &str,
        recorded_at: DateTime<Utc>,
    ) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO settlement_journal (
                entry_id, clinic_id, settlement_date, event, payload,
                prev_hash, entry_hash, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry_id,
                clinic_id,
                settlement_date,
                event,
                payload,
                prev_hash,
                entry_hash,
                recorded_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Hash of the most recent entry.
    pub fn last_journal_hash(&self) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT entry_hash FROM settlement_journal ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Every entry in append order.
    pub fn list_journal(&self) -> DbResult<Vec<JournalRow>> {
        self.query_journal("", params![])
    }

    /// Entries for one clinic-day in append order.
    pub fn list_journal_for_day(
        &self,
        clinic_id: &str,
        settlement_date: NaiveDate,
    ) -> DbResult<Vec<JournalRow>> {
        self.query_journal(
            "WHERE clinic_id = ?1 AND settlement_date = ?2",
            params![clinic_id, settlement_date],
        )
    }

    fn query_journal(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> DbResult<Vec<JournalRow>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT seq, entry_id, clinic_id, settlement_date, event, payload,
                   prev_hash, entry_hash, recorded_at
            FROM settlement_journal
            {}
            ORDER BY seq ASC
            "#,
            filter
        ))?;

        let rows = stmt.query_map(args, |row| {
            Ok(JournalRow {
                seq: row.get(0)?,
                entry_id: row.get(1)?,
                clinic_id: row.get(2)?,
                settlement_date: row.get(3)?,
                event: row.get(4)?,
                payload: row.get(5)?,
                prev_hash: row.get(6)?,
                entry_hash: row.get(7)?,
                recorded_at: row.get(8)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
