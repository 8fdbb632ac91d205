use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::calendar::CalendarFields;
use crate::config::Settings;
use crate::domain::{DailySnapshot, DateRange, PagePerformanceRecord, Site, SiteId};
use crate::error::Result;
use crate::source::{MetricsSource, COUNTRY, DEVICE_CATEGORY};
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub range: DateRange,
    pub top_pages_limit: u32,
    pub traffic_sources_limit: u32,
    pub excluded_path_fragments: Vec<String>,
    /// Sites not yet started once this passes are skipped.
    pub deadline: Option<Instant>,
}

impl CollectOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            range: settings.date_range(),
            top_pages_limit: settings.top_pages_limit,
            traffic_sources_limit: settings.traffic_sources_limit,
            excluded_path_fragments: settings.excluded_path_fragments.clone(),
            deadline: Some(Instant::now() + settings.run_budget()),
        }
    }
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            range: DateRange::trailing_day(),
            top_pages_limit: 20,
            traffic_sources_limit: 10,
            excluded_path_fragments: vec!["/admin".to_string(), "/.well-known".to_string()],
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub sites: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub snapshot_errors: usize,
    pub pages_written: usize,
    pub page_errors: usize,
    /// Site listing itself failed; nothing was collected.
    pub listing_failed: bool,
}

impl CollectReport {
    pub fn failures(&self) -> usize {
        self.failed
            + self.skipped
            + self.snapshot_errors
            + self.page_errors
            + usize::from(self.listing_failed)
    }
}

#[derive(Debug, Default)]
struct PageOutcome {
    written: usize,
    errors: usize,
}

/// Pulls one daily snapshot (plus top pages) per registered site.
pub struct Collector {
    source: Arc<dyn MetricsSource>,
    store: Arc<dyn RecordStore>,
    options: CollectOptions,
}

impl Collector {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        store: Arc<dyn RecordStore>,
        options: CollectOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    pub async fn run(&self) -> CollectReport {
        self.run_at(Utc::now()).await
    }

    /// Collect every site, stamping snapshots with the calendar fields of `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> CollectReport {
        let mut report = CollectReport::default();

        let sites = match self.store.list_sites().await {
            Ok(sites) => sites,
            Err(e) => {
                error!(error = %e, "Failed to list sites");
                report.listing_failed = true;
                return report;
            }
        };

        report.sites = sites.len();
        info!(sites = sites.len(), range = %self.options.range, "Collecting snapshots");

        let calendar = CalendarFields::from_datetime(now);

        for (index, site) in sites.iter().enumerate() {
            if self.deadline_passed() {
                let remaining = sites.len() - index;
                warn!(remaining, "Run budget exhausted, skipping remaining sites");
                report.skipped = remaining;
                break;
            }

            match self.collect_site(site, calendar, &mut report).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    error!(
                        site_id = %site.id,
                        site = %site.name,
                        property_id = %site.ga4_property_id,
                        error = %e,
                        "Failed to collect site"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            pages = report.pages_written,
            "Collection finished"
        );
        report
    }

    fn deadline_passed(&self) -> bool {
        self.options
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    async fn collect_site(
        &self,
        site: &Site,
        calendar: CalendarFields,
        report: &mut CollectReport,
    ) -> Result<()> {
        let property_id = site.ga4_property_id.as_str();
        let range = &self.options.range;

        let totals = self.source.fetch_daily_totals(property_id, range).await?;
        let top_device = self
            .source
            .fetch_top_dimension_value(property_id, DEVICE_CATEGORY, range)
            .await?;
        let top_country = self
            .source
            .fetch_top_dimension_value(property_id, COUNTRY, range)
            .await?;

        let traffic_sources = match self
            .source
            .fetch_traffic_sources(property_id, range, self.options.traffic_sources_limit)
            .await
        {
            Ok(sources) => sources,
            Err(e) => {
                warn!(site_id = %site.id, error = %e, "Traffic sources unavailable, storing none");
                Vec::new()
            }
        };

        let snapshot = DailySnapshot::new(
            site.id,
            calendar,
            &totals,
            top_device,
            top_country,
            traffic_sources,
        );

        match self.store.upsert_snapshot(&snapshot).await {
            Ok(()) => debug!(
                site_id = %site.id,
                date = %snapshot.snapshot_date,
                sessions = snapshot.sessions,
                "Snapshot stored"
            ),
            Err(e) => {
                error!(site_id = %site.id, error = %e, "Failed to store snapshot");
                report.snapshot_errors += 1;
            }
        }

        if site.collects_pages() {
            let outcome = self.collect_pages(site.id, property_id, calendar).await;
            report.pages_written += outcome.written;
            report.page_errors += outcome.errors;
        } else {
            debug!(site_id = %site.id, "Extended collection disabled");
        }

        Ok(())
    }

    async fn collect_pages(
        &self,
        site_id: SiteId,
        property_id: &str,
        calendar: CalendarFields,
    ) -> PageOutcome {
        let mut outcome = PageOutcome::default();

        let pages = match self
            .source
            .fetch_top_pages(property_id, &self.options.range, self.options.top_pages_limit)
            .await
        {
            Ok(pages) => pages,
            Err(e) => {
                warn!(%site_id, error = %e, "Failed to fetch top pages");
                outcome.errors += 1;
                return outcome;
            }
        };

        for page in pages
            .iter()
            .filter(|p| !is_excluded_path(&p.path, &self.options.excluded_path_fragments))
        {
            let record = PagePerformanceRecord::from_metrics(site_id, calendar.date, page);
            match self.store.upsert_page_performance(&record).await {
                Ok(()) => outcome.written += 1,
                Err(e) => {
                    warn!(%site_id, path = %page.path, error = %e, "Failed to store page");
                    outcome.errors += 1;
                }
            }
        }

        outcome
    }
}

/// Substring match against any excluded fragment.
pub fn is_excluded_path(path: &str, fragments: &[String]) -> bool {
    fragments
        .iter()
        .any(|fragment| !fragment.is_empty() && path.contains(fragment.as_str()))
}
