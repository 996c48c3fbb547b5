//! Concurrent writers over separate connections to one database file.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use chairside_core::models::{Clinic, Patient};
use chairside_core::{
    BillingAccumulator, CheckIn, ClinicError, Collaborators, Database, EngineConfig, FixedClock,
    InvoiceLine, InvoiceRequest, PaymentChannel, QueueLedger, RetryPolicy, SettlementEngine,
    SettlementStatus,
};
use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

const CLINIC: &str = "clinic-1";
const WORKERS: usize = 8;

fn collaborators() -> Collaborators {
    let config = EngineConfig {
        retry: RetryPolicy::new(50, 5, 100),
        ..EngineConfig::default()
    };
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 5, 0, 0).unwrap()));
    Collaborators::new(config).with_clock(clock)
}

fn seed(dir: &TempDir) -> (std::path::PathBuf, Vec<String>) {
    let path = dir.path().join("clinic.db");
    let db = Database::open(&path).unwrap();
    db.insert_clinic(&Clinic::new(CLINIC, "Indiranagar", 330)).unwrap();
    let patients = (0..WORKERS)
        .map(|i| {
            let patient = Patient::new(format!("P{}", i));
            db.insert_patient(&patient).unwrap();
            patient.patient_id
        })
        .collect();
    (path, patients)
}

#[test]
fn test_concurrent_check_ins_get_distinct_positions() {
    let dir = TempDir::new().unwrap();
    let (path, patients) = seed(&dir);
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = patients
        .into_iter()
        .enumerate()
        .map(|(i, patient_id)| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let ctx = collaborators();
                let ledger = QueueLedger::new(&db, &ctx);
                let request = if i % 3 == 0 {
                    CheckIn::emergency(&patient_id, CLINIC)
                } else {
                    CheckIn::walk_in(&patient_id, CLINIC)
                };
                barrier.wait();
                ledger.check_in(&request).unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let db = Database::open(&path).unwrap();
    let ctx = collaborators();
    let queue = QueueLedger::new(&db, &ctx).active_queue(CLINIC).unwrap();
    assert_eq!(queue.len(), WORKERS);

    let positions: Vec<u32> = queue.iter().filter_map(|v| v.queue_position).collect();
    let unique: HashSet<u32> = positions.iter().copied().collect();
    assert_eq!(unique.len(), WORKERS);
    assert_eq!(positions, (1..=WORKERS as u32).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_close_succeeds_once() {
    let dir = TempDir::new().unwrap();
    let (path, _) = seed(&dir);
    let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let ctx = collaborators();
                barrier.wait();
                SettlementEngine::new(&db, &ctx)
                    .close_day(CLINIC, day, &format!("owner-{}", i))
                    .is_ok()
            })
        })
        .collect();

    let closed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(closed, 1);

    let db = Database::open(&path).unwrap();
    let ctx = collaborators();
    let engine = SettlementEngine::new(&db, &ctx);
    assert_eq!(engine.history(CLINIC, day).unwrap().len(), 1);
    assert!(engine.verify_journal().unwrap().valid);
}

#[test]
fn test_invoices_racing_close_are_all_settled_or_locked() {
    const INVOICES_PER_WORKER: i64 = 10;

    let dir = TempDir::new().unwrap();
    let (path, patients) = seed(&dir);
    let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let billers = patients.len() - 1;
    let barrier = Arc::new(Barrier::new(billers + 1));

    let handles: Vec<_> = patients
        .into_iter()
        .take(billers)
        .enumerate()
        .map(|(i, patient_id)| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let ctx = collaborators();
                let billing = BillingAccumulator::new(&db, &ctx);
                barrier.wait();

                let mut accepted = 0i64;
                for n in 0..INVOICES_PER_WORKER {
                    let amount = 1_000 * (i as i64 + 1) + n;
                    let request = InvoiceRequest {
                        clinic_id: CLINIC.into(),
                        patient_id: patient_id.clone(),
                        visit_id: None,
                        payment_channel: if n % 2 == 0 {
                            PaymentChannel::Cash
                        } else {
                            PaymentChannel::Card
                        },
                        lines: vec![InvoiceLine {
                            description: "Filling".into(),
                            quantity: 1,
                            unit_price_minor: amount,
                            tax_rate_bp: 0,
                        }],
                        billed_on: None,
                    };
                    match billing.record_invoice(&request) {
                        Ok(entry) => accepted += entry.total_minor,
                        Err(ClinicError::DayLocked { .. }) => {}
                        Err(other) => panic!("unexpected error: {:?}", other),
                    }
                }
                accepted
            })
        })
        .collect();

    let closer = {
        let path = path.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            let db = Database::open(&path).unwrap();
            let ctx = collaborators();
            barrier.wait();
            SettlementEngine::new(&db, &ctx)
                .close_day(CLINIC, day, "owner-1")
                .unwrap()
        })
    };

    let accepted: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let closed = closer.join().unwrap();
    assert_eq!(closed.status, SettlementStatus::Closed);
    assert_eq!(closed.summary.total_revenue, accepted);

    let db = Database::open(&path).unwrap();
    let ctx = collaborators();
    let entries = BillingAccumulator::new(&db, &ctx)
        .daily_transactions(CLINIC, day)
        .unwrap();
    assert_eq!(entries.iter().map(|e| e.total_minor).sum::<i64>(), accepted);
    assert_eq!(closed.summary.procedure_count as usize, entries.len());

    let stored = SettlementEngine::new(&db, &ctx).status(CLINIC, day).unwrap().unwrap();
    assert_eq!(stored.summary.total_revenue, accepted);
}
