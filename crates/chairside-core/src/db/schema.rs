//! SQLite schema definition.

/// Complete database schema for chairside.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Clinics and Staff
-- ============================================================================

CREATE TABLE IF NOT EXISTS clinics (
    clinic_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    utc_offset_minutes INTEGER NOT NULL DEFAULT 0
        CHECK (utc_offset_minutes BETWEEN -1439 AND 1439),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clinic_staff (
    staff_id TEXT PRIMARY KEY,
    clinic_id TEXT NOT NULL REFERENCES clinics(clinic_id),
    full_name TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('doctor', 'owner', 'receptionist')),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_staff_clinic_role ON clinic_staff(clinic_id, role);

-- ============================================================================
-- Patients (identity only, no credentials)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    phone TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(full_name);

-- ============================================================================
-- Visits (Queue Ledger)
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    visit_id TEXT PRIMARY KEY,
    clinic_id TEXT NOT NULL REFERENCES clinics(clinic_id),
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    doctor_id TEXT,                              -- NULL while unassigned
    visit_day TEXT NOT NULL,                     -- clinic-local YYYY-MM-DD
    visit_type TEXT NOT NULL DEFAULT 'consultation'
        CHECK (visit_type IN ('consultation', 'follow_up')),
    state TEXT NOT NULL DEFAULT 'scheduled'
        CHECK (state IN ('scheduled', 'waiting', 'in_chair', 'completed', 'cancelled')),
    queue_position INTEGER CHECK (queue_position IS NULL OR queue_position > 0),
    is_emergency INTEGER NOT NULL DEFAULT 0,
    scheduled_start TEXT,
    waiting_at TEXT,
    in_chair_at TEXT,
    completed_at TEXT,
    cancelled_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (state NOT IN ('waiting', 'in_chair') OR queue_position IS NOT NULL)
);

-- Active positions are distinct within a clinic-day
CREATE UNIQUE INDEX IF NOT EXISTS idx_visits_active_position
    ON visits(clinic_id, visit_day, queue_position)
    WHERE state IN ('waiting', 'in_chair');

-- At most one open visit per patient per clinic-day
CREATE UNIQUE INDEX IF NOT EXISTS idx_visits_open_patient
    ON visits(clinic_id, patient_id, visit_day)
    WHERE state IN ('scheduled', 'waiting', 'in_chair');

CREATE INDEX IF NOT EXISTS idx_visits_clinic_day ON visits(clinic_id, visit_day);

-- Transition timestamps are written once
CREATE TRIGGER IF NOT EXISTS visits_timestamps_write_once BEFORE UPDATE ON visits
WHEN (old.waiting_at IS NOT NULL AND new.waiting_at IS NOT old.waiting_at)
  OR (old.in_chair_at IS NOT NULL AND new.in_chair_at IS NOT old.in_chair_at)
  OR (old.completed_at IS NOT NULL AND new.completed_at IS NOT old.completed_at)
  OR (old.cancelled_at IS NOT NULL AND new.cancelled_at IS NOT old.cancelled_at)
BEGIN
    SELECT RAISE(ABORT, 'Visit timestamps are write-once');
END;

-- Retired visits never change state again
CREATE TRIGGER IF NOT EXISTS visits_terminal_state BEFORE UPDATE OF state ON visits
WHEN old.state IN ('completed', 'cancelled') AND new.state <> old.state
BEGIN
    SELECT RAISE(ABORT, 'Visit is in a terminal state');
END;

-- ============================================================================
-- Billing
-- ============================================================================

CREATE TABLE IF NOT EXISTS billing_entries (
    billing_id TEXT PRIMARY KEY,
    invoice_no TEXT NOT NULL,
    clinic_id TEXT NOT NULL REFERENCES clinics(clinic_id),
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    visit_id TEXT REFERENCES visits(visit_id),
    payment_channel TEXT NOT NULL CHECK (payment_channel IN ('cash', 'card', 'electronic')),
    subtotal_minor INTEGER NOT NULL CHECK (subtotal_minor >= 0),
    tax_minor INTEGER NOT NULL CHECK (tax_minor >= 0),
    total_minor INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'finalized' CHECK (status IN ('finalized', 'void')),
    is_verified INTEGER NOT NULL DEFAULT 0,
    billed_on TEXT NOT NULL,                     -- clinic-local YYYY-MM-DD
    created_at TEXT NOT NULL,
    UNIQUE (clinic_id, invoice_no),
    CHECK (total_minor = subtotal_minor + tax_minor)
);

CREATE INDEX IF NOT EXISTS idx_billing_clinic_day ON billing_entries(clinic_id, billed_on);

CREATE TABLE IF NOT EXISTS billing_line_items (
    billing_id TEXT NOT NULL REFERENCES billing_entries(billing_id),
    line_no INTEGER NOT NULL,
    description TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price_minor INTEGER NOT NULL CHECK (unit_price_minor >= 0),
    tax_rate_bp INTEGER NOT NULL DEFAULT 0 CHECK (tax_rate_bp >= 0),
    PRIMARY KEY (billing_id, line_no)
);

-- ============================================================================
-- Inventory
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventory_items (
    item_id TEXT PRIMARY KEY,
    clinic_id TEXT NOT NULL REFERENCES clinics(clinic_id),
    name TEXT NOT NULL,
    stock_quantity INTEGER NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
    min_stock_level INTEGER NOT NULL DEFAULT 0 CHECK (min_stock_level >= 0),
    updated_at TEXT NOT NULL,
    UNIQUE (clinic_id, name)
);

-- ============================================================================
-- Day Settlements (never deleted)
-- ============================================================================

CREATE TABLE IF NOT EXISTS day_settlements (
    clinic_id TEXT NOT NULL REFERENCES clinics(clinic_id),
    settlement_date TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('open', 'closed')),
    cash_total INTEGER NOT NULL DEFAULT 0,
    card_total INTEGER NOT NULL DEFAULT 0,
    electronic_total INTEGER NOT NULL DEFAULT 0,
    total_revenue INTEGER NOT NULL DEFAULT 0,
    patient_count INTEGER NOT NULL DEFAULT 0,
    procedure_count INTEGER NOT NULL DEFAULT 0,
    new_patient_count INTEGER NOT NULL DEFAULT 0,
    follow_up_count INTEGER NOT NULL DEFAULT 0,
    low_stock_items TEXT NOT NULL DEFAULT '[]',  -- JSON array of item names
    closed_at TEXT,
    closed_by TEXT,
    unlock_history TEXT NOT NULL DEFAULT '[]',   -- JSON array of UnlockEvent
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (clinic_id, settlement_date),
    CHECK (total_revenue = cash_total + card_total + electronic_total),
    CHECK (status = 'open' OR (closed_at IS NOT NULL AND closed_by IS NOT NULL))
);

CREATE TRIGGER IF NOT EXISTS day_settlements_no_delete BEFORE DELETE ON day_settlements
BEGIN
    SELECT RAISE(ABORT, 'Settlement records cannot be deleted');
END;

-- ============================================================================
-- Settlement Journal (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS settlement_journal (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id TEXT NOT NULL UNIQUE,
    clinic_id TEXT NOT NULL,
    settlement_date TEXT NOT NULL,
    event TEXT NOT NULL CHECK (event IN ('closed', 'unlocked')),
    payload TEXT NOT NULL,                       -- canonical JSON
    prev_hash TEXT NOT NULL,                     -- SHA-256 of previous entry
    entry_hash TEXT NOT NULL UNIQUE,             -- SHA-256(prev_hash || payload)
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_journal_clinic_day ON settlement_journal(clinic_id, settlement_date);

CREATE TRIGGER IF NOT EXISTS settlement_journal_no_update BEFORE UPDATE ON settlement_journal
BEGIN
    SELECT RAISE(ABORT, 'Settlement journal is append-only');
END;

CREATE TRIGGER IF NOT EXISTS settlement_journal_no_delete BEFORE DELETE ON settlement_journal
BEGIN
    SELECT RAISE(ABORT, 'Settlement journal is append-only');
END;
"#;
