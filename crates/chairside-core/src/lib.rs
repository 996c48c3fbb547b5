//! Chairside Core Library
//!
//! Visit queue and day-close settlement engine for dental clinics.
//!
//! # Architecture
//!
//! ```text
//! check-in ──▶ Queue Ledger ──────────────▶ Notification Sink
//!                  │  (positions, emergency shift,     ▲
//!                  │   visit state machine)            │
//!                  ▼                                   │
//!              [visits]        invoices ──▶ Billing    │
//!                  │                      Accumulator  │
//!                  │                           │       │
//!                  │          checkLock ◀──────┤       │
//!                  ▼                           ▼       │
//!          ┌───────────────────────────────────────┐   │
//!          │           Settlement Engine           │───┘
//!          │  close: totals by channel, counts,    │
//!          │         low stock, lock the day       │
//!          │  unlock: reopen with reason           │
//!          └───────────────────┬───────────────────┘
//!                              ▼
//!                  Settlement Journal (hash chain)
//! ```
//!
//! # Core Principle
//!
//! **Every read-then-write runs in one exclusive transaction.** Queue
//! positions and the day lock are never decided from an unlocked read.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage layer
//! - [`models`]: Domain types (VisitEntry, DaySettlement, BillingEntry, etc.)
//! - [`queue`]: Queue ledger and attending-doctor resolution
//! - [`billing`]: Billing accumulator
//! - [`settlement`]: Settlement engine and hash-chained journal
//! - [`notify`]: Notification sinks
//! - [`txn`]: Exclusive transactions with bounded retry

pub mod billing;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod queue;
pub mod settlement;
pub mod txn;

// Re-export commonly used types
pub use billing::BillingAccumulator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use collaborators::Collaborators;
pub use config::{EngineConfig, RetryPolicy};
pub use db::{Database, DbError};
pub use error::{ClinicError, ClinicResult};
pub use models::{
    BillingEntry, BillingStatus, ChannelTotals, Clinic, DaySettlement, DaySummary, InventoryItem,
    InvoiceLine, InvoiceRequest, Patient, PaymentChannel, SettlementStatus, StaffMember,
    StaffRole, VisitEntry, VisitState, VisitType,
};
pub use notify::{LogSink, Notification, NotificationSink, NotifyError, NotifyTarget, QueuedSink, RecordingSink};
pub use queue::{AttendingDoctorResolver, CheckIn, FirstClinicDoctor, QueueLedger};
pub use settlement::{JournalVerification, SettlementEngine};
