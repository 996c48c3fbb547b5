//! Queue ledger integration tests.

use std::sync::Arc;

use chairside_core::models::{Clinic, Patient, VisitEntry, VisitState};
use chairside_core::{
    BillingAccumulator, CheckIn, ClinicError, Collaborators, Database, FixedClock, InvoiceLine,
    InvoiceRequest, PaymentChannel, QueueLedger, SettlementEngine,
};
use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

const CLINIC: &str = "clinic-1";

fn setup() -> (Database, Collaborators) {
    let db = Database::open_in_memory().unwrap();
    db.insert_clinic(&Clinic::new(CLINIC, "Indiranagar", 330)).unwrap();
    // 10:30 IST, 2024-03-04
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 5, 0, 0).unwrap()));
    let ctx = Collaborators::default().with_clock(clock);
    (db, ctx)
}

fn register(db: &Database, name: &str) -> String {
    let patient = Patient::new(name.to_string());
    db.insert_patient(&patient).unwrap();
    patient.patient_id
}

fn positions(queue: &[VisitEntry]) -> Vec<(String, u32)> {
    queue
        .iter()
        .map(|v| (v.patient_id.clone(), v.queue_position.unwrap()))
        .collect()
}

#[test]
fn test_walk_in_emergency_and_close_scenario() {
    let (db, ctx) = setup();
    let ledger = QueueLedger::new(&db, &ctx);
    let a = register(&db, "A");
    let b = register(&db, "B");
    let c = register(&db, "C");

    let visit_a = ledger.check_in(&CheckIn::walk_in(&a, CLINIC)).unwrap();
    assert_eq!(visit_a.queue_position, Some(1));
    let visit_b = ledger.check_in(&CheckIn::walk_in(&b, CLINIC)).unwrap();
    assert_eq!(visit_b.queue_position, Some(2));

    let visit_c = ledger.check_in(&CheckIn::emergency(&c, CLINIC)).unwrap();
    assert_eq!(visit_c.queue_position, Some(1));
    assert_eq!(
        positions(&ledger.active_queue(CLINIC).unwrap()),
        vec![(c.clone(), 1), (a.clone(), 2), (b.clone(), 3)]
    );

    ledger.advance(&visit_a.visit_id, VisitState::InChair).unwrap();
    ledger.advance(&visit_a.visit_id, VisitState::Completed).unwrap();
    assert_eq!(
        positions(&ledger.active_queue(CLINIC).unwrap()),
        vec![(c.clone(), 1), (b.clone(), 3)]
    );

    let settlement = SettlementEngine::new(&db, &ctx);
    let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    settlement.close_day(CLINIC, day, "owner-1").unwrap();
    assert!(matches!(
        settlement.close_day(CLINIC, day, "owner-1"),
        Err(ClinicError::AlreadyClosed { .. })
    ));
}

#[test]
fn test_emergency_leaves_retired_entries_alone() {
    let (db, ctx) = setup();
    let ledger = QueueLedger::new(&db, &ctx);
    let a = register(&db, "A");
    let b = register(&db, "B");
    let c = register(&db, "C");

    let visit_a = ledger.check_in(&CheckIn::walk_in(&a, CLINIC)).unwrap();
    ledger.check_in(&CheckIn::walk_in(&b, CLINIC)).unwrap();
    ledger.advance(&visit_a.visit_id, VisitState::InChair).unwrap();
    ledger.advance(&visit_a.visit_id, VisitState::Cancelled).unwrap();

    ledger.check_in(&CheckIn::emergency(&c, CLINIC)).unwrap();

    let retired = ledger.get_visit(&visit_a.visit_id).unwrap();
    assert_eq!(retired.state, VisitState::Cancelled);
    assert_eq!(retired.queue_position, Some(1));
    assert_eq!(
        positions(&ledger.active_queue(CLINIC).unwrap()),
        vec![(c, 1), (b, 3)]
    );
}

#[test]
fn test_back_to_back_emergencies() {
    let (db, ctx) = setup();
    let ledger = QueueLedger::new(&db, &ctx);
    let a = register(&db, "A");
    let e1 = register(&db, "E1");
    let e2 = register(&db, "E2");

    ledger.check_in(&CheckIn::walk_in(&a, CLINIC)).unwrap();
    ledger.check_in(&CheckIn::emergency(&e1, CLINIC)).unwrap();
    ledger.check_in(&CheckIn::emergency(&e2, CLINIC)).unwrap();

    assert_eq!(
        positions(&ledger.active_queue(CLINIC).unwrap()),
        vec![(e2, 1), (e1, 2), (a, 3)]
    );
}

#[test]
fn test_in_chair_entry_is_shifted_by_emergency() {
    let (db, ctx) = setup();
    let ledger = QueueLedger::new(&db, &ctx);
    let a = register(&db, "A");
    let e = register(&db, "E");

    let visit_a = ledger.check_in(&CheckIn::walk_in(&a, CLINIC)).unwrap();
    ledger.advance(&visit_a.visit_id, VisitState::InChair).unwrap();
    ledger.check_in(&CheckIn::emergency(&e, CLINIC)).unwrap();

    let queue = ledger.active_queue(CLINIC).unwrap();
    assert_eq!(positions(&queue), vec![(e, 1), (a, 2)]);
    assert_eq!(queue[1].state, VisitState::InChair);
}

#[test]
fn test_closed_day_rejects_invoices_until_unlocked() {
    let (db, ctx) = setup();
    let a = register(&db, "A");
    let billing = BillingAccumulator::new(&db, &ctx);
    let settlement = SettlementEngine::new(&db, &ctx);
    let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

    let request = InvoiceRequest {
        clinic_id: CLINIC.into(),
        patient_id: a,
        visit_id: None,
        payment_channel: PaymentChannel::Cash,
        lines: vec![InvoiceLine {
            description: "Consultation".into(),
            quantity: 1,
            unit_price_minor: 50_000,
            tax_rate_bp: 0,
        }],
        billed_on: None,
    };

    settlement.close_day(CLINIC, day, "owner-1").unwrap();
    assert!(matches!(
        billing.record_invoice(&request),
        Err(ClinicError::DayLocked { .. })
    ));

    settlement
        .unlock_day(CLINIC, day, "Late walk-in payment", "owner-1")
        .unwrap();
    billing.record_invoice(&request).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any mix of walk-ins and emergencies keeps active positions at 1..=k.
    #[test]
    fn prop_positions_stay_contiguous(emergencies in proptest::collection::vec(any::<bool>(), 1..12)) {
        let (db, ctx) = setup();
        let ledger = QueueLedger::new(&db, &ctx);

        for (i, is_emergency) in emergencies.iter().enumerate() {
            let patient = register(&db, &format!("P{}", i));
            let request = if *is_emergency {
                CheckIn::emergency(&patient, CLINIC)
            } else {
                CheckIn::walk_in(&patient, CLINIC)
            };
            let visit = ledger.check_in(&request).unwrap();
            if *is_emergency {
                prop_assert_eq!(visit.queue_position, Some(1));
            }

            let queue = ledger.active_queue(CLINIC).unwrap();
            let got: Vec<u32> = queue.iter().filter_map(|v| v.queue_position).collect();
            let expected: Vec<u32> = (1..=(i as u32 + 1)).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
