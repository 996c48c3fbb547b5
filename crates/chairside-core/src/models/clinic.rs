//! Clinic, staff and inventory reference data.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A clinic location. Its UTC offset defines local midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub clinic_id: String,
    pub name: String,
    /// Minutes east of UTC (330 for IST)
    pub utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
}

impl Clinic {
    pub fn new(clinic_id: impl Into<String>, name: impl Into<String>, utc_offset_minutes: i32) -> Self {
        Self {
            clinic_id: clinic_id.into(),
            name: name.into(),
            utc_offset_minutes,
            created_at: Utc::now(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Clinic-local calendar date of an instant.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset()).date_naive()
    }

    /// `[local midnight, next local midnight)` of `date`, in UTC.
    pub fn day_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let offset = self.offset();
        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        let start = offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight));
        (start, start + Duration::days(1))
    }
}

/// Staff role within a clinic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Doctor,
    Owner,
    Receptionist,
}

/// A staff member attached to a clinic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffMember {
    pub staff_id: String,
    pub clinic_id: String,
    pub full_name: String,
    pub role: StaffRole,
    pub created_at: DateTime<Utc>,
}

impl StaffMember {
    pub fn new(clinic_id: impl Into<String>, full_name: impl Into<String>, role: StaffRole) -> Self {
        Self {
            staff_id: uuid::Uuid::new_v4().to_string(),
            clinic_id: clinic_id.into(),
            full_name: full_name.into(),
            role,
            created_at: Utc::now(),
        }
    }
}

/// Stock level of one consumable in a clinic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub item_id: String,
    pub clinic_id: String,
    pub name: String,
    pub stock_quantity: i64,
    pub min_stock_level: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn new(
        clinic_id: impl Into<String>,
        name: impl Into<String>,
        stock_quantity: i64,
        min_stock_level: i64,
    ) -> Self {
        Self {
            item_id: uuid::Uuid::new_v4().to_string(),
            clinic_id: clinic_id.into(),
            name: name.into(),
            stock_quantity,
            min_stock_level,
            updated_at: Utc::now(),
        }
    }

    /// At or below the configured minimum.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_date_crosses_midnight() {
        let clinic = Clinic::new("clinic-1", "Indiranagar", 330);
        // 20:00 UTC is 01:30 next day in IST
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap();
        assert_eq!(clinic.local_date(at), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_day_window() {
        let clinic = Clinic::new("clinic-1", "Indiranagar", 330);
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let (start, end) = clinic.day_window(date);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 4, 18, 30, 0).unwrap());
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn test_low_stock_threshold_inclusive() {
        assert!(InventoryItem::new("c", "Gloves", 10, 10).is_low_stock());
        assert!(!InventoryItem::new("c", "Gloves", 11, 10).is_low_stock());
    }
}
