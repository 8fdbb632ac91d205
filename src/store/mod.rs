use async_trait::async_trait;

use crate::domain::{DailySnapshot, PagePerformanceRecord, Period, PeriodAggregate, Scope, Site};
use crate::error::Result;

/// Persistence seam shared by the collector and the aggregator.
///
/// Every `upsert_*` replaces the row matching its natural key instead of
/// failing on conflict, so re-running a stage overwrites rather than duplicates.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn list_sites(&self) -> Result<Vec<Site>>;

    /// Keyed by (site_id, snapshot_date, scope).
    async fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> Result<()>;

    /// Keyed by (site_id, page_path, date).
    async fn upsert_page_performance(&self, record: &PagePerformanceRecord) -> Result<()>;

    async fn list_snapshots(&self, scope: Scope) -> Result<Vec<DailySnapshot>>;

    /// Keyed by [`Period::conflict_columns`].
    async fn upsert_period_aggregate(
        &self,
        period: Period,
        aggregate: &PeriodAggregate,
    ) -> Result<()>;
}
