//! Clinic and staff database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Clinic, StaffMember, StaffRole};

impl Database {
    /// Insert a new clinic.
    pub fn insert_clinic(&self, clinic: &Clinic) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO clinics (clinic_id, name, utc_offset_minutes, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                clinic.clinic_id,
                clinic.name,
                clinic.utc_offset_minutes,
                clinic.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a clinic by ID.
    pub fn get_clinic(&self, clinic_id: &str) -> DbResult<Option<Clinic>> {
        self.conn
            .query_row(
                r#"
                SELECT clinic_id, name, utc_offset_minutes, created_at
                FROM clinics
                WHERE clinic_id = ?
                "#,
                [clinic_id],
                |row| {
                    Ok(Clinic {
                        clinic_id: row.get(0)?,
                        name: row.get(1)?,
                        utc_offset_minutes: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert a staff member.
    pub fn insert_staff_member(&self, staff: &StaffMember) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO clinic_staff (staff_id, clinic_id, full_name, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                staff.staff_id,
                staff.clinic_id,
                staff.full_name,
                role_to_string(staff.role),
                staff.created_at,
            ],
        )?;
        Ok(())
    }

    /// Staff of a clinic holding `role`, oldest first.
    pub fn list_staff_by_role(&self, clinic_id: &str, role: StaffRole) -> DbResult<Vec<StaffMember>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT staff_id, clinic_id, full_name, role, created_at
            FROM clinic_staff
            WHERE clinic_id = ?1 AND role = ?2
            ORDER BY created_at, staff_id
            "#,
        )?;

        let rows = stmt.query_map(params![clinic_id, role_to_string(role)], |row| {
            Ok(StaffRow {
                staff_id: row.get(0)?,
                clinic_id: row.get(1)?,
                full_name: row.get(2)?,
                role: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut staff = Vec::new();
        for row in rows {
            staff.push(row?.try_into()?);
        }
        Ok(staff)
    }
}

/// Intermediate row struct for database mapping.
struct StaffRow {
    staff_id: String,
    clinic_id: String,
    full_name: String,
    role: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<StaffRow> for StaffMember {
    type Error = DbError;

    fn try_from(row: StaffRow) -> Result<Self, Self::Error> {
        Ok(StaffMember {
            staff_id: row.staff_id,
            clinic_id: row.clinic_id,
            full_name: row.full_name,
            role: string_to_role(&row.role)?,
            created_at: row.created_at,
        })
    }
}

fn role_to_string(role: StaffRole) -> &'static str {
    match role {
        StaffRole::Doctor => "doctor",
        StaffRole::Owner => "owner",
        StaffRole::Receptionist => "receptionist",
    }
}

fn string_to_role(s: &str) -> Result<StaffRole, DbError> {
    match s {
        "doctor" => Ok(StaffRole::Doctor),
        "owner" => Ok(StaffRole::Owner),
        "receptionist" => Ok(StaffRole::Receptionist),
        _ => Err(DbError::Constraint(format!("Unknown staff role: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_clinic() {
        let db = Database::open_in_memory().unwrap();
        let clinic = Clinic::new("clinic-1", "Koramangala", 330);
        db.insert_clinic(&clinic).unwrap();

        let retrieved = db.get_clinic("clinic-1").unwrap().unwrap();
        assert_eq!(retrieved.name, "Koramangala");
        assert_eq!(retrieved.utc_offset_minutes, 330);
        assert!(db.get_clinic("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_staff_by_role() {
        let db = Database::open_in_memory().unwrap();
        db.insert_clinic(&Clinic::new("clinic-1", "Koramangala", 330))
            .unwrap();

        let doctor = StaffMember::new("clinic-1", "Dr. Menon", StaffRole::Doctor);
        let owner = StaffMember::new("clinic-1", "Priya", StaffRole::Owner);
        db.insert_staff_member(&doctor).unwrap();
        db.insert_staff_member(&owner).unwrap();

        let doctors = db.list_staff_by_role("clinic-1", StaffRole::Doctor).unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].full_name, "Dr. Menon");
        assert_eq!(doctors[0].role, StaffRole::Doctor);

        let receptionists = db
            .list_staff_by_role("clinic-1", StaffRole::Receptionist)
            .unwrap();
        assert!(receptionists.is_empty());
    }

    #[test]
    fn test_staff_requires_known_clinic() {
        let db = Database::open_in_memory().unwrap();
        let doctor = StaffMember::new("nowhere", "Dr. Menon", StaffRole::Doctor);
        assert!(db.insert_staff_member(&doctor).is_err());
    }
}
