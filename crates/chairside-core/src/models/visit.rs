//! Visit entries and the visit state machine.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, ClinicResult};

/// Doctor label reported while no attending doctor could be resolved.
pub const UNASSIGNED_DOCTOR: &str = "unassigned";

/// Lifecycle state of a visit entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitState {
    /// Booked ahead of time, patient not yet arrived
    Scheduled,
    /// Checked in and holding a queue position
    Waiting,
    /// Being treated
    InChair,
    /// Treatment finished (terminal)
    Completed,
    /// Abandoned (terminal)
    Cancelled,
}

impl VisitState {
    /// Active entries hold a queue position.
    pub fn is_active(self) -> bool {
        matches!(self, VisitState::Waiting | VisitState::InChair)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, VisitState::Completed | VisitState::Cancelled)
    }

    /// Whether `next` is a legal single step from this state.
    pub fn can_transition_to(self, next: VisitState) -> bool {
        use VisitState::*;
        matches!(
            (self, next),
            (Scheduled, Waiting)
                | (Waiting, InChair)
                | (Waiting, Cancelled)
                | (InChair, Completed)
                | (InChair, Cancelled)
        )
    }
}

impl fmt::Display for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VisitState::Scheduled => "SCHEDULED",
            VisitState::Waiting => "WAITING",
            VisitState::InChair => "IN_CHAIR",
            VisitState::Completed => "COMPLETED",
            VisitState::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// Kind of visit, used for the new-patient / follow-up split at day close.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    /// First consultation (counted as a new patient)
    #[default]
    Consultation,
    FollowUp,
}

/// One timestamp per transition actually taken.
///
/// Each field is written at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisitTimestamps {
    pub waiting_at: Option<DateTime<Utc>>,
    pub in_chair_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl VisitTimestamps {
    fn slot_mut(&mut self, entered: VisitState) -> Option<&mut Option<DateTime<Utc>>> {
        match entered {
            VisitState::Scheduled => None,
            VisitState::Waiting => Some(&mut self.waiting_at),
            VisitState::InChair => Some(&mut self.in_chair_at),
            VisitState::Completed => Some(&mut self.completed_at),
            VisitState::Cancelled => Some(&mut self.cancelled_at),
        }
    }

    /// Timestamp recorded when `state` was entered, if any.
    pub fn entered(&self, state: VisitState) -> Option<DateTime<Utc>> {
        match state {
            VisitState::Scheduled => None,
            VisitState::Waiting => self.waiting_at,
            VisitState::InChair => self.in_chair_at,
            VisitState::Completed => self.completed_at,
            VisitState::Cancelled => self.cancelled_at,
        }
    }
}

/// Outcome of a requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// State changed and a timestamp was recorded
    Applied,
    /// Already in the requested state; nothing changed
    Replayed,
}

/// One patient's presence in a clinic on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitEntry {
    pub visit_id: String,
    pub clinic_id: String,
    pub patient_id: String,
    /// Provisional attending doctor; `None` while unassigned
    pub doctor_id: Option<String>,
    /// Clinic-local calendar day
    pub visit_day: NaiveDate,
    pub visit_type: VisitType,
    pub state: VisitState,
    /// Set while WAITING or IN_CHAIR; kept on retired entries
    pub queue_position: Option<u32>,
    pub is_emergency: bool,
    /// Booked start time (pre-arrival entries only)
    pub scheduled_start: Option<DateTime<Utc>>,
    pub timestamps: VisitTimestamps,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VisitEntry {
    /// Create a new entry in the SCHEDULED state.
    pub fn new(
        clinic_id: String,
        patient_id: String,
        visit_day: NaiveDate,
        visit_type: VisitType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            visit_id: uuid::Uuid::new_v4().to_string(),
            clinic_id,
            patient_id,
            doctor_id: None,
            visit_day,
            visit_type,
            state: VisitState::Scheduled,
            queue_position: None,
            is_emergency: false,
            scheduled_start: None,
            timestamps: VisitTimestamps::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, recording the entry timestamp.
    ///
    /// Requesting the current state again is a no-op success so that
    /// clients may retry.
    pub fn transition(
        &mut self,
        next: VisitState,
        at: DateTime<Utc>,
    ) -> ClinicResult<TransitionOutcome> {
        if self.state == next {
            return Ok(TransitionOutcome::Replayed);
        }
        if !self.state.can_transition_to(next) {
            return Err(ClinicError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        if let Some(slot) = self.timestamps.slot_mut(next) {
            if slot.is_none() {
                *slot = Some(at);
            }
        }
        self.state = next;
        self.updated_at = at;
        Ok(TransitionOutcome::Applied)
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Estimated wait in minutes (position × slot length) for active entries.
    pub fn estimated_wait_minutes(&self, slot_minutes: u32) -> Option<u32> {
        if !self.is_active() {
            return None;
        }
        self.queue_position
            .map(|position| position.saturating_mul(slot_minutes))
    }

    /// Attending doctor id, or the unassigned label.
    pub fn attending_doctor(&self) -> &str {
        self.doctor_id.as_deref().unwrap_or(UNASSIGNED_DOCTOR)
    }
}
