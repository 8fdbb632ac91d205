use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Calendar fields stored alongside each snapshot so rollups can group
/// without date arithmetic in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFields {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub quarter: u32,
    /// ISO-8601 week number (Monday start, week 1 holds the first Thursday).
    pub week: u32,
    /// Year the ISO week belongs to; differs from `year` around New Year.
    pub iso_year: i32,
}

impl CalendarFields {
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            date,
            year: date.year(),
            month: date.month(),
            day: date.day(),
            quarter: quarter_of(date.month()),
            week: iso.week(),
            iso_year: iso.year(),
        }
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self::from_date(at.date_naive())
    }
}

/// Quarter (1-4) for a 1-based month.
pub fn quarter_of(month: u32) -> u32 {
    (month.saturating_sub(1)) / 3 + 1
}
