mod models;
mod types;

pub use models::{
    DailySnapshot, DailyTotals, PageMetrics, PagePerformanceRecord, PeriodAggregate, Site,
    TrafficSourceEntry,
};
pub use types::{DateRange, Period, PeriodKey, Scope, SiteId};
