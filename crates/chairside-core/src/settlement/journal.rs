//! Hash-chained settlement journal.
//!
//! Every close and unlock appends one entry whose hash covers the previous
//! entry's hash and its own canonical JSON payload:
//!
//! ```text
//! entry_hash = SHA-256(prev_hash || payload)
//! ```
//!
//! The first entry chains from [`GENESIS_HASH`]. Close summaries stay in the
//! journal even after the live settlement record is overwritten by a later
//! close.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{Database, JournalRow};
use crate::error::ClinicResult;
use crate::models::{DaySettlement, DaySummary};

/// Previous hash of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of journal entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JournalEvent {
    Closed,
    Unlocked,
}

impl JournalEvent {
    fn as_str(self) -> &'static str {
        match self {
            JournalEvent::Closed => "closed",
            JournalEvent::Unlocked => "unlocked",
        }
    }
}

/// Canonical payload of one entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalPayload {
    pub event: JournalEvent,
    pub clinic_id: String,
    pub settlement_date: NaiveDate,
    pub operator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DaySummary>,
    pub recorded_at: DateTime<Utc>,
}

/// Result of re-walking the chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalVerification {
    pub valid: bool,
    pub entries: u32,
    /// Sequence number of the first entry that does not verify
    pub first_broken_seq: Option<i64>,
    /// Hash of the last entry
    pub head_hash: Option<String>,
}

/// Hash data using SHA-256.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn chain_hash(prev_hash: &str, payload: &str) -> String {
    hash_data(format!("{}{}", prev_hash, payload).as_bytes())
}

/// Append one entry for `settlement`. Must run inside the transaction that
/// wrote the settlement record.
pub(crate) fn append(
    db: &Database,
    settlement: &DaySettlement,
    event: JournalEvent,
    operator_id: &str,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> ClinicResult<String> {
    let payload = JournalPayload {
        event,
        clinic_id: settlement.clinic_id.clone(),
        settlement_date: settlement.settlement_date,
        operator_id: operator_id.to_string(),
        reason: reason.map(str::to_string),
        summary: match event {
            JournalEvent::Closed => Some(settlement.summary.clone()),
            JournalEvent::Unlocked => None,
        },
        recorded_at: now,
    };
    let payload_json = serde_json::to_string(&payload)?;

    let prev_hash = db
        .last_journal_hash()?
        .unwrap_or_else(|| GENESIS_HASH.to_string());
    let entry_hash = chain_hash(&prev_hash, &payload_json);

    db.append_journal_entry(
        &uuid::Uuid::new_v4().to_string(),
        &settlement.clinic_id,
        settlement.settlement_date,
        event.as_str(),
        &payload_json,
        &prev_hash,
        &entry_hash,
        now,
    )?;
    Ok(entry_hash)
}

/// Re-walk the whole chain and report the first entry that does not verify.
pub fn verify(db: &Database) -> ClinicResult<JournalVerification> {
    let rows = db.list_journal()?;
    Ok(verify_rows(&rows))
}

fn verify_rows(rows: &[JournalRow]) -> JournalVerification {
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut first_broken_seq = None;

    for row in rows {
        let recomputed = chain_hash(&row.prev_hash, &row.payload);
        if row.prev_hash != expected_prev || recomputed != row.entry_hash {
            first_broken_seq = Some(row.seq);
            break;
        }
        expected_prev = row.entry_hash.clone();
    }

    JournalVerification {
        valid: first_broken_seq.is_none(),
        entries: rows.len() as u32,
        first_broken_seq,
        head_hash: rows.last().map(|row| row.entry_hash.clone()),
    }
}

/// Decode a stored payload.
pub fn decode_payload(row: &JournalRow) -> ClinicResult<JournalPayload> {
    Ok(serde_json::from_str(&row.payload)?)
}
