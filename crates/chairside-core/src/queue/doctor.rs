//! Attending-doctor resolution.

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::error::ClinicResult;
use crate::models::StaffRole;

/// Picks the provisional attending doctor for a check-in.
///
/// `Ok(None)` means unassigned. Errors are logged by the caller and treated
/// as unassigned; they never fail a check-in.
pub trait AttendingDoctorResolver: Send + Sync {
    fn resolve(
        &self,
        db: &Database,
        clinic_id: &str,
        at: DateTime<Utc>,
    ) -> ClinicResult<Option<String>>;
}

/// The first doctor registered on the clinic's staff.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstClinicDoctor;

impl AttendingDoctorResolver for FirstClinicDoctor {
    fn resolve(
        &self,
        db: &Database,
        clinic_id: &str,
        _at: DateTime<Utc>,
    ) -> ClinicResult<Option<String>> {
        let doctors = db.list_staff_by_role(clinic_id, StaffRole::Doctor)?;
        Ok(doctors.into_iter().next().map(|doctor| doctor.staff_id))
    }
}

/// Always the same doctor (or nobody).
#[derive(Debug, Clone, Default)]
pub struct FixedDoctor(pub Option<String>);

impl AttendingDoctorResolver for FixedDoctor {
    fn resolve(
        &self,
        _db: &Database,
        _clinic_id: &str,
        _at: DateTime<Utc>,
    ) -> ClinicResult<Option<String>> {
        Ok(self.0.clone())
    }
}
