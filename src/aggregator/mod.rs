use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::domain::{DailySnapshot, Period, PeriodAggregate, PeriodKey, Scope};
use crate::stats::Accumulator;
use crate::store::RecordStore;

/// Roll daily snapshots up into one row per (site, period bucket).
///
/// Sums for sessions, pageviews and active users; unweighted arithmetic
/// means for duration and rates. Output is sorted by key, so the result
/// does not depend on input order.
pub fn aggregate(snapshots: &[DailySnapshot], period: Period) -> Vec<PeriodAggregate> {
    let mut buckets: BTreeMap<PeriodKey, Accumulator> = BTreeMap::new();

    for snapshot in snapshots {
        buckets.entry(period.key_of(snapshot)).or_default().push(
            snapshot.sessions,
            snapshot.pageviews,
            snapshot.active_users,
            snapshot.avg_session_duration,
            snapshot.engagement_rate,
            snapshot.bounce_rate,
        );
    }

    buckets
        .into_iter()
        .map(|(key, acc)| PeriodAggregate {
            site_id: key.site_id,
            year: key.year,
            unit: key.unit,
            sessions: acc.sessions,
            pageviews: acc.pageviews,
            active_users: acc.active_users,
            avg_duration: acc.mean_session_duration(),
            engagement_rate: acc.mean_engagement_rate(),
            bounce_rate: acc.mean_bounce_rate(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateReport {
    pub snapshots: usize,
    pub weekly: usize,
    pub monthly: usize,
    pub quarterly: usize,
    pub yearly: usize,
    pub errors: usize,
    /// Snapshot listing failed; nothing was aggregated.
    pub listing_failed: bool,
}

impl AggregateReport {
    pub fn written(&self, period: Period) -> usize {
        match period {
            Period::Weekly => self.weekly,
            Period::Monthly => self.monthly,
            Period::Quarterly => self.quarterly,
            Period::Yearly => self.yearly,
        }
    }

    fn record(&mut self, period: Period, written: usize) {
        let slot = match period {
            Period::Weekly => &mut self.weekly,
            Period::Monthly => &mut self.monthly,
            Period::Quarterly => &mut self.quarterly,
            Period::Yearly => &mut self.yearly,
        };
        *slot += written;
    }

    pub fn failures(&self) -> usize {
        self.errors + usize::from(self.listing_failed)
    }
}

/// Recomputes every period table from the full set of daily snapshots.
pub struct Aggregator {
    store: Arc<dyn RecordStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self) -> AggregateReport {
        let mut report = AggregateReport::default();

        let snapshots = match self.store.list_snapshots(Scope::Daily).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(error = %e, "Failed to load snapshots");
                report.listing_failed = true;
                return report;
            }
        };

        report.snapshots = snapshots.len();
        info!(snapshots = snapshots.len(), "Aggregating snapshots");

        for period in Period::ALL {
            let rows = aggregate(&snapshots, period);
            let mut written = 0;

            for row in &rows {
                match self.store.upsert_period_aggregate(period, row).await {
                    Ok(()) => written += 1,
                    Err(e) => {
                        error!(
                            table = period.table_name(),
                            site_id = %row.site_id,
                            year = row.year,
                            unit = ?row.unit,
                            error = %e,
                            "Failed to store aggregate"
                        );
                        report.errors += 1;
                    }
                }
            }

            debug!(table = period.table_name(), rows = rows.len(), written, "Period done");
            report.record(period, written);
        }

        info!(
            weekly = report.weekly,
            monthly = report.monthly,
            quarterly = report.quarterly,
            yearly = report.yearly,
            errors = report.errors,
            "Aggregation finished"
        );
        report
    }
}
