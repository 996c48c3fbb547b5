//! Visit (queue entry) database operations.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{VisitEntry, VisitState, VisitTimestamps, VisitType};

const VISIT_COLUMNS: &str = r#"
    visit_id, clinic_id, patient_id, doctor_id, visit_day, visit_type, state,
    queue_position, is_emergency, scheduled_start, waiting_at, in_chair_at,
    completed_at, cancelled_at, created_at, updated_at
"#;

impl Database {
    /// Insert a new visit entry.
    pub fn insert_visit(&self, visit: &VisitEntry) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO visits ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                VISIT_COLUMNS
            ),
            params![
                visit.visit_id,
                visit.clinic_id,
                visit.patient_id,
                visit.doctor_id,
                visit.visit_day,
                visit_type_to_string(visit.visit_type),
                state_to_string(visit.state),
                visit.queue_position,
                visit.is_emergency,
                visit.scheduled_start,
                visit.timestamps.waiting_at,
                visit.timestamps.in_chair_at,
                visit.timestamps.completed_at,
                visit.timestamps.cancelled_at,
                visit.created_at,
                visit.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Persist the mutable fields of an existing visit.
    pub fn update_visit(&self, visit: &VisitEntry) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE visits SET
                doctor_id = ?2,
                visit_type = ?3,
                state = ?4,
                queue_position = ?5,
                is_emergency = ?6,
                waiting_at = ?7,
                in_chair_at = ?8,
                completed_at = ?9,
                cancelled_at = ?10,
                updated_at = ?11
            WHERE visit_id = ?1
            "#,
            params![
                visit.visit_id,
                visit.doctor_id,
                visit_type_to_string(visit.visit_type),
                state_to_string(visit.state),
                visit.queue_position,
                visit.is_emergency,
                visit.timestamps.waiting_at,
                visit.timestamps.in_chair_at,
                visit.timestamps.completed_at,
                visit.timestamps.cancelled_at,
                visit.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, visit_id: &str) -> DbResult<Option<VisitEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM visits WHERE visit_id = ?", VISIT_COLUMNS),
                [visit_id],
                visit_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// The patient's SCHEDULED, WAITING or IN_CHAIR visit for a clinic-day.
    pub fn find_open_visit(
        &self,
        clinic_id: &str,
        patient_id: &str,
        visit_day: NaiveDate,
    ) -> DbResult<Option<VisitEntry>> {
        self.conn
            .query_row(
                &format!(
                    r#"
                    SELECT {} FROM visits
                    WHERE clinic_id = ?1 AND patient_id = ?2 AND visit_day = ?3
                      AND state IN ('scheduled', 'waiting', 'in_chair')
                    "#,
                    VISIT_COLUMNS
                ),
                params![clinic_id, patient_id, visit_day],
                visit_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Highest position ever handed out for a clinic-day, retired entries included.
    pub fn max_queue_position(&self, clinic_id: &str, visit_day: NaiveDate) -> DbResult<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(queue_position) FROM visits WHERE clinic_id = ?1 AND visit_day = ?2",
            params![clinic_id, visit_day],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// WAITING and IN_CHAIR visits of a clinic-day, ascending by position.
    pub fn list_active_visits(
        &self,
        clinic_id: &str,
        visit_day: NaiveDate,
    ) -> DbResult<Vec<VisitEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM visits
            WHERE clinic_id = ?1 AND visit_day = ?2 AND state IN ('waiting', 'in_chair')
            ORDER BY queue_position ASC
            "#,
            VISIT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![clinic_id, visit_day], visit_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }

    /// Push every active visit of a clinic-day one position down.
    ///
    /// Rows are moved highest position first so the active-position unique
    /// index holds after every single-row update. Returns the shifted visits
    /// with their new positions.
    pub fn shift_active_positions(
        &self,
        clinic_id: &str,
        visit_day: NaiveDate,
        at: DateTime<Utc>,
    ) -> DbResult<Vec<VisitEntry>> {
        let mut active = self.list_active_visits(clinic_id, visit_day)?;
        let mut stmt = self.conn.prepare(
            r#"
            UPDATE visits SET queue_position = queue_position + 1, updated_at = ?2
            WHERE visit_id = ?1
            "#,
        )?;
        for visit in active.iter_mut().rev() {
            stmt.execute(params![visit.visit_id, at])?;
            visit.queue_position = visit.queue_position.map(|p| p + 1);
            visit.updated_at = at;
        }
        Ok(active)
    }

    /// (consultation, follow-up) counts of non-cancelled visits for a clinic-day.
    pub fn count_visits_by_type(&self, clinic_id: &str, visit_day: NaiveDate) -> DbResult<(u32, u32)> {
        self.conn
            .query_row(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN visit_type = 'consultation' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN visit_type = 'follow_up' THEN 1 ELSE 0 END), 0)
                FROM visits
                WHERE clinic_id = ?1 AND visit_day = ?2 AND state <> 'cancelled'
                "#,
                params![clinic_id, visit_day],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(Into::into)
    }
}

fn visit_row(row: &Row<'_>) -> rusqlite::Result<VisitRow> {
    Ok(VisitRow {
        visit_id: row.get(0)?,
        clinic_id: row.get(1)?,
        patient_id: row.get(2)?,
        doctor_id: row.get(3)?,
        visit_day: row.get(4)?,
        visit_type: row.get(5)?,
        state: row.get(6)?,
        queue_position: row.get(7)?,
        is_emergency: row.get(8)?,
        scheduled_start: row.get(9)?,
        waiting_at: row.get(10)?,
        in_chair_at: row.get(11)?,
        completed_at: row.get(12)?,
        cancelled_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    visit_id: String,
    clinic_id: String,
    patient_id: String,
    doctor_id: Option<String>,
    visit_day: NaiveDate,
    visit_type: String,
    state: String,
    queue_position: Option<u32>,
    is_emergency: bool,
    scheduled_start: Option<DateTime<Utc>>,
    waiting_at: Option<DateTime<Utc>>,
    in_chair_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VisitRow> for VisitEntry {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        Ok(VisitEntry {
            visit_id: row.visit_id,
            clinic_id: row.clinic_id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            visit_day: row.visit_day,
            visit_type: string_to_visit_type(&row.visit_type)?,
            state: string_to_state(&row.state)?,
            queue_position: row.queue_position,
            is_emergency: row.is_emergency,
            scheduled_start: row.scheduled_start,
            timestamps: VisitTimestamps {
                waiting_at: row.waiting_at,
                in_chair_at: row.in_chair_at,
                completed_at: row.completed_at,
                cancelled_at: row.cancelled_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn state_to_string(state: VisitState) -> &'static str {
    match state {
        VisitState::Scheduled => "scheduled",
        VisitState::Waiting => "waiting",
        VisitState::InChair => "in_chair",
        VisitState::Completed => "completed",
        VisitState::Cancelled => "cancelled",
    }
}

fn string_to_state(s: &str) -> Result<VisitState, DbError> {
    match s {
        "scheduled" => Ok(VisitState::Scheduled),
        "waiting" => Ok(VisitState::Waiting),
        "in_chair" => Ok(VisitState::InChair),
        "completed" => Ok(VisitState::Completed),
        "cancelled" => Ok(VisitState::Cancelled),
        _ => Err(DbError::Constraint(format!("Unknown visit state: {}", s))),
    }
}

fn visit_type_to_string(visit_type: VisitType) -> &'static str {
    match visit_type {
        VisitType::Consultation => "consultation",
        VisitType::FollowUp => "follow_up",
    }
}

fn string_to_visit_type(s: &str) -> Result<VisitType, DbError> {
    match s {
        "consultation" => Ok(VisitType::Consultation),
        "follow_up" => Ok(VisitType::FollowUp),
        _ => Err(DbError::Constraint(format!("Unknown visit type: {}", s))),
    }
}
