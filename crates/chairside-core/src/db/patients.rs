//! Patient database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Patient;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (patient_id, full_name, phone, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                patient.patient_id,
                patient.full_name,
                patient.phone,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                r#"
                SELECT patient_id, full_name, phone, created_at, updated_at
                FROM patients
                WHERE patient_id = ?
                "#,
                [patient_id],
                |row| {
                    Ok(Patient {
                        patient_id: row.get(0)?,
                        full_name: row.get(1)?,
                        phone: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Whether a patient with this ID exists.
    pub fn patient_exists(&self, patient_id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE patient_id = ?",
            [patient_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
