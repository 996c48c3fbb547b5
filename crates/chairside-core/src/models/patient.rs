//! Patient identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A patient known to the clinic group.
///
/// This is an identity record only; it carries no login credentials and is
/// not tied to any authentication account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// UUID generated on registration
    pub patient_id: String,
    pub full_name: String,
    /// Contact number, if given at the desk
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Register a new walk-in patient.
    pub fn new(full_name: String) -> Self {
        let now = Utc::now();
        Self {
            patient_id: uuid::Uuid::new_v4().to_string(),
            full_name,
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}
