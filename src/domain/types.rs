use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::models::DailySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub Uuid);

impl SiteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SiteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SiteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Snapshot granularity tag. Only daily snapshots are collected today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Scope {
    #[default]
    Daily,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date range in the analytics source's own vocabulary
/// (`"today"`, `"7daysAgo"`, `"2025-03-01"`...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl DateRange {
    pub fn new(start_date: &str, end_date: &str) -> Self {
        Self {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
        }
    }

    /// Yesterday through today.
    pub fn trailing_day() -> Self {
        Self::new("1daysAgo", "today")
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::trailing_day()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_date, self.end_date)
    }
}

/// Rollup granularity. Each period owns one aggregate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::Weekly,
        Period::Monthly,
        Period::Quarterly,
        Period::Yearly,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly_stats",
            Self::Monthly => "monthly_stats",
            Self::Quarterly => "quarterly_stats",
            Self::Yearly => "yearly_stats",
        }
    }

    /// Column holding the sub-year unit, if the period has one.
    pub fn unit_column(&self) -> Option<&'static str> {
        match self {
            Self::Weekly => Some("week"),
            Self::Monthly => Some("month"),
            Self::Quarterly => Some("quarter"),
            Self::Yearly => None,
        }
    }

    pub fn conflict_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Weekly => &["site_id", "year", "week"],
            Self::Monthly => &["site_id", "year", "month"],
            Self::Quarterly => &["site_id", "year", "quarter"],
            Self::Yearly => &["site_id", "year"],
        }
    }

    /// Bucket a snapshot falls into. Weeks are keyed by ISO week-year so that
    /// late-December days in week 1 land with the following January.
    pub fn key_of(&self, snapshot: &DailySnapshot) -> PeriodKey {
        let (year, unit) = match self {
            Self::Weekly => (snapshot.iso_year, Some(snapshot.week)),
            Self::Monthly => (snapshot.year, Some(snapshot.month)),
            Self::Quarterly => (snapshot.year, Some(snapshot.quarter)),
            Self::Yearly => (snapshot.year, None),
        };
        PeriodKey {
            site_id: snapshot.site_id,
            year,
            unit,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Natural key of a period aggregate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub site_id: SiteId,
    pub year: i32,
    pub unit: Option<u32>,
}
