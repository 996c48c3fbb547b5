//! Human-readable day-close digest sent to the clinic owner.

use crate::models::DaySettlement;

/// Minor units as a decimal amount with two places.
pub fn format_minor(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

pub fn owner_digest(settlement: &DaySettlement) -> String {
    let summary = &settlement.summary;
    format!(
        "{}: total {} (cash {}, card {}, electronic {}). Patients: {} ({} new, {} follow-up). Procedures: {}. Stock alerts: {}.",
        settlement.settlement_date,
        format_minor(summary.total_revenue),
        format_minor(summary.totals.cash),
        format_minor(summary.totals.card),
        format_minor(summary.totals.electronic),
        summary.patient_count,
        summary.new_patient_count,
        summary.follow_up_count,
        summary.procedure_count,
        summary.low_stock_items.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelTotals, DaySummary};
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_format_minor() {
        assert_eq!(format_minor(0), "0.00");
        assert_eq!(format_minor(5), "0.05");
        assert_eq!(format_minor(123_456), "1234.56");
        assert_eq!(format_minor(-250), "-2.50");
    }

    #[test]
    fn test_owner_digest() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut settlement = DaySettlement::open("clinic-1".into(), date, Utc::now());
        settlement.summary = DaySummary {
            totals: ChannelTotals {
                cash: 150_000,
                card: 0,
                electronic: 50_050,
            },
            total_revenue: 200_050,
            patient_count: 4,
            procedure_count: 6,
            new_patient_count: 3,
            follow_up_count: 1,
            low_stock_items: vec!["Gloves".into()],
        };

        let digest = owner_digest(&settlement);
        assert!(digest.starts_with("2024-03-04: total 2000.50"));
        assert!(digest.contains("electronic 500.50"));
        assert!(digest.contains("Patients: 4 (3 new, 1 follow-up)"));
        assert!(digest.ends_with("Stock alerts: 1."));
    }
}
