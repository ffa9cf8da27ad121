//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Local calendar date, used as the processing date of a run
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse a provider date string into a calendar date
///
/// Providers hand out ISO dates (`2024-03-01`), ISO timestamps
/// (`2024-03-01T10:00:00Z`) and day-first dates (`01-03-2024 10:00:00`).
/// The first run of digits decides: four digits means year-first.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let nums: Vec<&str> = s
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .collect();
    if nums.len() < 3 {
        return None;
    }
    let (y, m, d) = if nums[0].len() == 4 {
        (nums[0], nums[1], nums[2])
    } else if nums[2].len() == 4 {
        (nums[2], nums[1], nums[0])
    } else {
        return None;
    };
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}
