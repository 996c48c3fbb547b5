//! Queue ledger: admission, reprioritization and visit progression.
//!
//! Positions for a clinic-day are assigned inside one `BEGIN IMMEDIATE`
//! transaction. The position read and the write that uses it cannot
//! interleave with another check-in, and the partial unique index on active
//! positions rejects anything that slips past.

mod doctor;

pub use doctor::{AttendingDoctorResolver, FirstClinicDoctor, FixedDoctor};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::collaborators::Collaborators;
use crate::db::Database;
use crate::error::{require_id, ClinicError, ClinicResult};
use crate::models::{Clinic, TransitionOutcome, VisitEntry, VisitState, VisitType};
use crate::notify::{self, NotifyTarget};
use crate::txn;

/// A check-in request.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckIn {
    pub patient_id: String,
    pub clinic_id: String,
    pub is_emergency: bool,
    /// Defaults to a consultation for new entries
    pub visit_type: Option<VisitType>,
}

impl CheckIn {
    pub fn walk_in(patient_id: impl Into<String>, clinic_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            clinic_id: clinic_id.into(),
            is_emergency: false,
            visit_type: None,
        }
    }

    pub fn emergency(patient_id: impl Into<String>, clinic_id: impl Into<String>) -> Self {
        Self {
            is_emergency: true,
            ..Self::walk_in(patient_id, clinic_id)
        }
    }

    pub fn with_visit_type(mut self, visit_type: VisitType) -> Self {
        self.visit_type = Some(visit_type);
        self
    }
}

/// What a committed check-in changed.
struct Admission {
    visit: VisitEntry,
    /// Entries pushed down by an emergency
    shifted: Vec<VisitEntry>,
    /// False when the patient was already in the queue
    admitted: bool,
}

/// Queue ledger service.
pub struct QueueLedger<'a> {
    db: &'a Database,
    ctx: &'a Collaborators,
}

impl<'a> QueueLedger<'a> {
    pub fn new(db: &'a Database, ctx: &'a Collaborators) -> Self {
        Self { db, ctx }
    }

    /// Admit a patient to today's queue.
    ///
    /// Emergencies take position 1 and push every active entry down by one;
    /// everyone else goes after the highest position handed out today. A
    /// SCHEDULED entry for the patient is promoted instead of creating a new
    /// one. If the patient is already WAITING or IN_CHAIR, that entry is
    /// returned unchanged.
    pub fn check_in(&self, request: &CheckIn) -> ClinicResult<VisitEntry> {
        require_id(&request.patient_id, "patient_id")?;
        require_id(&request.clinic_id, "clinic_id")?;

        let now = self.ctx.clock.now();
        let admission = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            self.admit(db, request, now)
        })?;

        if !admission.admitted {
            debug!(
                "Patient {} already queued as #{:?}",
                request.patient_id, admission.visit.queue_position
            );
            return Ok(admission.visit);
        }

        info!(
            "Checked in patient {} at clinic {} as #{} (emergency: {})",
            admission.visit.patient_id,
            admission.visit.clinic_id,
            admission.visit.queue_position.unwrap_or_default(),
            admission.visit.is_emergency
        );

        self.notify_position(&admission.visit, "Checked in");
        for moved in &admission.shifted {
            self.notify_position(moved, "Queue updated");
        }

        Ok(admission.visit)
    }

    fn admit(&self, db: &Database, request: &CheckIn, now: DateTime<Utc>) -> ClinicResult<Admission> {
        let clinic = require_clinic(db, &request.clinic_id)?;
        if !db.patient_exists(&request.patient_id)? {
            return Err(ClinicError::NotFound(format!("patient {}", request.patient_id)));
        }
        let day = clinic.local_date(now);

        let existing = db.find_open_visit(&clinic.clinic_id, &request.patient_id, day)?;
        if let Some(visit) = existing.as_ref().filter(|v| v.is_active()) {
            return Ok(Admission {
                visit: visit.clone(),
                shifted: Vec::new(),
                admitted: false,
            });
        }

        let mut shifted = Vec::new();
        let position = if request.is_emergency {
            shifted = db.shift_active_positions(&clinic.clinic_id, day, now)?;
            1
        } else {
            db.max_queue_position(&clinic.clinic_id, day)? + 1
        };
        debug!(
            "Position {} for clinic {} on {} ({} shifted)",
            position,
            clinic.clinic_id,
            day,
            shifted.len()
        );

        let promoted = existing.is_some();
        let mut visit = match existing {
            Some(scheduled) => scheduled,
            None => VisitEntry::new(
                clinic.clinic_id.clone(),
                request.patient_id.clone(),
                day,
                request.visit_type.unwrap_or_default(),
                now,
            ),
        };
        if let Some(visit_type) = request.visit_type {
            visit.visit_type = visit_type;
        }
        if visit.doctor_id.is_none() {
            visit.doctor_id = self.resolve_doctor(db, &clinic.clinic_id, now);
        }
        visit.is_emergency = request.is_emergency;
        visit.queue_position = Some(position);
        visit.transition(VisitState::Waiting, now)?;

        if promoted {
            db.update_visit(&visit)?;
        } else {
            db.insert_visit(&visit)?;
        }

        Ok(Admission {
            visit,
            shifted,
            admitted: true,
        })
    }

    fn resolve_doctor(&self, db: &Database, clinic_id: &str, at: DateTime<Utc>) -> Option<String> {
        match self.ctx.doctors.resolve(db, clinic_id, at) {
            Ok(doctor) => doctor,
            Err(e) => {
                warn!("Doctor resolution failed for clinic {}: {}", clinic_id, e);
                None
            }
        }
    }

    /// Move a visit to IN_CHAIR, COMPLETED or CANCELLED.
    ///
    /// Retiring a visit leaves the other positions untouched.
    pub fn advance(&self, visit_id: &str, next: VisitState) -> ClinicResult<VisitEntry> {
        require_id(visit_id, "visit_id")?;
        if matches!(next, VisitState::Scheduled | VisitState::Waiting) {
            return Err(ClinicError::Validation(format!(
                "{} is reached through scheduling or check-in",
                next
            )));
        }

        let now = self.ctx.clock.now();
        let (visit, outcome) = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            let mut visit = db
                .get_visit(visit_id)?
                .ok_or_else(|| ClinicError::NotFound(format!("visit {}", visit_id)))?;
            let outcome = visit.transition(next, now)?;
            if outcome == TransitionOutcome::Applied {
                db.update_visit(&visit)?;
            }
            Ok((visit, outcome))
        })?;

        if outcome == TransitionOutcome::Applied {
            info!("Visit {} moved to {}", visit.visit_id, visit.state);
            if next == VisitState::InChair {
                notify::deliver(
                    self.ctx.notifier.as_ref(),
                    NotifyTarget::patient(&visit.patient_id),
                    "Your turn",
                    "The doctor is ready for you.".to_string(),
                );
            }
        }
        Ok(visit)
    }

    /// Book a SCHEDULED visit on the clinic-local day of `starts_at`.
    pub fn schedule(
        &self,
        patient_id: &str,
        clinic_id: &str,
        starts_at: DateTime<Utc>,
        visit_type: VisitType,
    ) -> ClinicResult<VisitEntry> {
        require_id(patient_id, "patient_id")?;
        require_id(clinic_id, "clinic_id")?;

        let now = self.ctx.clock.now();
        let visit = txn::exclusive(self.db, &self.ctx.config.retry, |db| {
            let clinic = require_clinic(db, clinic_id)?;
            if !db.patient_exists(patient_id)? {
                return Err(ClinicError::NotFound(format!("patient {}", patient_id)));
            }

            let day = clinic.local_date(starts_at);
            if day < clinic.local_date(now) {
                return Err(ClinicError::Validation(format!(
                    "cannot schedule on past day {}",
                    day
                )));
            }
            if db.find_open_visit(clinic_id, patient_id, day)?.is_some() {
                return Err(ClinicError::Validation(format!(
                    "patient {} already has an open visit on {}",
                    patient_id, day
                )));
            }

            let mut visit = VisitEntry::new(
                clinic_id.to_string(),
                patient_id.to_string(),
                day,
                visit_type,
                now,
            );
            visit.scheduled_start = Some(starts_at);
            db.insert_visit(&visit)?;
            Ok(visit)
        })?;

        info!(
            "Scheduled patient {} at clinic {} on {}",
            patient_id, clinic_id, visit.visit_day
        );
        Ok(visit)
    }

    /// WAITING and IN_CHAIR entries for the clinic's current local day,
    /// ascending by position.
    pub fn active_queue(&self, clinic_id: &str) -> ClinicResult<Vec<VisitEntry>> {
        require_id(clinic_id, "clinic_id")?;
        let clinic = require_clinic(self.db, clinic_id)?;
        let day = clinic.local_date(self.ctx.clock.now());
        Ok(self.db.list_active_visits(clinic_id, day)?)
    }

    pub fn get_visit(&self, visit_id: &str) -> ClinicResult<VisitEntry> {
        self.db
            .get_visit(visit_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("visit {}", visit_id)))
    }

    fn notify_position(&self, visit: &VisitEntry, title: &str) {
        let (Some(position), Some(wait)) = (
            visit.queue_position,
            visit.estimated_wait_minutes(self.ctx.config.slot_minutes),
        ) else {
            return;
        };
        notify::deliver(
            self.ctx.notifier.as_ref(),
            NotifyTarget::patient(&visit.patient_id),
            title,
            format!("You are #{} in line. Estimated wait: {} mins.", position, wait),
        );
    }
}

pub(crate) fn require_clinic(db: &Database, clinic_id: &str) -> ClinicResult<Clinic> {
    db.get_clinic(clinic_id)?
        .ok_or_else(|| ClinicError::NotFound(format!("clinic {}", clinic_id)))
}
