mod auth;
mod ga4;
mod report;
mod retry;

use async_trait::async_trait;

use crate::domain::{DailyTotals, DateRange, PageMetrics, TrafficSourceEntry};
use crate::error::Result;

pub use auth::{ServiceAccountKey, TokenProvider, ANALYTICS_READONLY_SCOPE};
pub use ga4::Ga4Client;
pub use report::{OrderBy, ReportRequest, ReportResponse, ReportRow};
pub use retry::RetryPolicy;

pub const DEVICE_CATEGORY: &str = "deviceCategory";
pub const COUNTRY: &str = "country";

/// Read side of the analytics provider, one property at a time.
///
/// Implementations convert provider payloads into typed values at this
/// boundary: absent metrics read as 0, absent dimension values as `None`.
#[async_trait]
pub trait MetricsSource: Send + Sync + 'static {
    async fn fetch_daily_totals(
        &self,
        property_id: &str,
        range: &DateRange,
    ) -> Result<DailyTotals>;

    /// Highest-ranked value of `dimension` by sessions. Ties go to the
    /// provider's first row.
    async fn fetch_top_dimension_value(
        &self,
        property_id: &str,
        dimension: &str,
        range: &DateRange,
    ) -> Result<Option<String>>;

    /// Pages ranked by pageviews, at most `limit`.
    async fn fetch_top_pages(
        &self,
        property_id: &str,
        range: &DateRange,
        limit: u32,
    ) -> Result<Vec<PageMetrics>>;

    /// Channel/source pairs ranked by sessions, at most `limit`.
    async fn fetch_traffic_sources(
        &self,
        property_id: &str,
        range: &DateRange,
        limit: u32,
    ) -> Result<Vec<TrafficSourceEntry>>;
}
