#![cfg(all(feature = "sqlite", not(feature = "postgres")))]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use ga4_rollup::calendar::CalendarFields;
use ga4_rollup::collector::CollectOptions;
use ga4_rollup::db::{self, Pool, SqlStore};
use ga4_rollup::domain::{
    DailySnapshot, DailyTotals, DateRange, PageMetrics, Period, Scope, Site, SiteId,
    TrafficSourceEntry,
};
use ga4_rollup::pipeline;
use ga4_rollup::source::{MetricsSource, COUNTRY, DEVICE_CATEGORY};
use ga4_rollup::store::RecordStore;
use ga4_rollup::{Error, Result};

/// Canned per-property responses. Unknown properties fail like a revoked grant.
#[derive(Default)]
struct ScriptedSource {
    properties: HashMap<String, Script>,
}

#[derive(Clone, Default)]
struct Script {
    totals: DailyTotals,
    device: Option<String>,
    country: Option<String>,
    pages: Vec<PageMetrics>,
    sources: Vec<TrafficSourceEntry>,
}

impl ScriptedSource {
    fn with(mut self, property_id: &str, script: Script) -> Self {
        self.properties.insert(property_id.to_string(), script);
        self
    }

    fn script(&self, property_id: &str) -> Result<&Script> {
        self.properties
            .get(property_id)
            .ok_or_else(|| Error::Unauthorized(format!("no access to {}", property_id)))
    }
}

#[async_trait]
impl MetricsSource for ScriptedSource {
    async fn fetch_daily_totals(&self, property_id: &str, _: &DateRange) -> Result<DailyTotals> {
        Ok(self.script(property_id)?.totals.clone())
    }

    async fn fetch_top_dimension_value(
        &self,
        property_id: &str,
        dimension: &str,
        _: &DateRange,
    ) -> Result<Option<String>> {
        let script = self.script(property_id)?;
        Ok(match dimension {
            DEVICE_CATEGORY => script.device.clone(),
            COUNTRY => script.country.clone(),
            _ => None,
        })
    }

    async fn fetch_top_pages(
        &self,
        property_id: &str,
        _: &DateRange,
        limit: u32,
    ) -> Result<Vec<PageMetrics>> {
        let script = self.script(property_id)?;
        Ok(script.pages.iter().take(limit as usize).cloned().collect())
    }

    async fn fetch_traffic_sources(
        &self,
        property_id: &str,
        _: &DateRange,
        limit: u32,
    ) -> Result<Vec<TrafficSourceEntry>> {
        let script = self.script(property_id)?;
        Ok(script.sources.iter().take(limit as usize).cloned().collect())
    }
}

async fn test_pool() -> Pool {
    let pool = db::create_pool("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

async fn register(pool: &Pool, name: &str, property_id: &str, extended: Option<bool>) -> Site {
    let site = Site {
        id: SiteId::new(),
        name: name.to_string(),
        ga4_property_id: property_id.to_string(),
        extended_collection: extended,
    };
    db::insert_site(pool, &site).await.unwrap();
    site
}

fn page(path: &str, pageviews: i64, entrances: i64) -> PageMetrics {
    PageMetrics {
        path: path.to_string(),
        title: format!("Title of {}", path),
        pageviews,
        avg_time: 40.0,
        bounce_rate: 0.35,
        entrances,
    }
}

fn blog_script() -> Script {
    Script {
        totals: DailyTotals {
            active_users: 90,
            sessions: 120,
            pageviews: 400,
            avg_session_duration: 72.5,
            engagement_rate: 0.65,
            new_users: 30,
        },
        device: Some("desktop".to_string()),
        country: Some("Germany".to_string()),
        pages: vec![
            page("/", 200, 80),
            page("/admin/login", 40, 40),
            page("/posts/rust", 120, 0),
            page("/drafts", 0, 5),
        ],
        sources: vec![
            TrafficSourceEntry {
                channel: "Organic Search".to_string(),
                source: "google".to_string(),
                sessions: 70,
                new_users: 20,
            },
            TrafficSourceEntry {
                channel: "Direct".to_string(),
                source: "(direct)".to_string(),
                sessions: 50,
                new_users: 10,
            },
        ],
    }
}

fn options() -> CollectOptions {
    CollectOptions {
        deadline: None,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_run_writes_snapshots_pages_and_rollups() {
    let pool = test_pool().await;
    let blog = register(&pool, "Blog", "111", None).await;
    let store = Arc::new(SqlStore::new(pool.clone()));
    let source = Arc::new(ScriptedSource::default().with("111", blog_script()));

    let report = pipeline::run_with(source, store.clone(), options()).await;
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.collect.succeeded, 1);
    assert_eq!(report.collect.pages_written, 3);

    let snapshots = store.list_snapshots(Scope::Daily).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert_eq!(snapshot.site_id, blog.id);
    assert_eq!(snapshot.sessions, 120);
    assert_eq!(snapshot.bounce_rate, 1.0 - 0.65);
    assert_eq!(snapshot.top_country.as_deref(), Some("Germany"));
    assert_eq!(snapshot.traffic_sources.len(), 2);
    assert_eq!(snapshot.snapshot_date, Utc::now().date_naive());

    let pages = db::list_page_performance(&pool, blog.id).await.unwrap();
    assert!(pages.iter().all(|p| !p.page_path.contains("/admin")));
    let drafts = pages.iter().find(|p| p.page_path == "/drafts").unwrap();
    assert_eq!(drafts.entrance_rate, 0.0);
    let home = pages.iter().find(|p| p.page_path == "/").unwrap();
    assert_eq!(home.entrance_rate, 0.4);

    for period in Period::ALL {
        let rows = db::list_period_aggregates(&pool, period).await.unwrap();
        assert_eq!(rows.len(), 1, "{}", period);
        assert_eq!(rows[0].sessions, 120);
        assert_eq!(rows[0].unit.is_none(), period == Period::Yearly);
    }
}

#[tokio::test]
async fn test_repeated_runs_do_not_duplicate() {
    let pool = test_pool().await;
    register(&pool, "Blog", "111", None).await;
    let store = Arc::new(SqlStore::new(pool.clone()));
    let source = Arc::new(ScriptedSource::default().with("111", blog_script()));

    let first = pipeline::run_with(source.clone(), store.clone(), options()).await;
    let weekly_first = db::list_period_aggregates(&pool, Period::Weekly).await.unwrap();

    let second = pipeline::run_with(source, store.clone(), options()).await;
    let weekly_second = db::list_period_aggregates(&pool, Period::Weekly).await.unwrap();

    assert!(first.is_clean() && second.is_clean());
    assert_eq!(store.list_snapshots(Scope::Daily).await.unwrap().len(), 1);
    assert_eq!(weekly_first, weekly_second);
    assert_eq!(weekly_second[0].sessions, 120);
}

#[tokio::test]
async fn test_failing_site_is_isolated_and_reported() {
    let pool = test_pool().await;
    let good = register(&pool, "Good", "111", None).await;
    register(&pool, "Revoked", "999", None).await;
    let store = Arc::new(SqlStore::new(pool.clone()));
    let source = Arc::new(ScriptedSource::default().with("111", blog_script()));

    let report = pipeline::run_with(source, store.clone(), options()).await;
    assert_eq!(report.collect.sites, 2);
    assert_eq!(report.collect.succeeded, 1);
    assert_eq!(report.collect.failed, 1);
    assert!(!report.is_clean());

    let snapshots = store.list_snapshots(Scope::Daily).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].site_id, good.id);

    // The aggregator still ran over what was collected.
    assert_eq!(report.aggregate.written(Period::Monthly), 1);
}

#[tokio::test]
async fn test_disabled_site_gets_snapshot_without_pages() {
    let pool = test_pool().await;
    let quiet = register(&pool, "Quiet", "222", Some(false)).await;
    let store = Arc::new(SqlStore::new(pool.clone()));
    let source = Arc::new(ScriptedSource::default().with("222", blog_script()));

    let report = pipeline::run_with(source, store, options()).await;
    assert_eq!(report.collect.pages_written, 0);
    assert!(db::list_page_performance(&pool, quiet.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_rollups_over_backfilled_history() {
    let pool = test_pool().await;
    let site = register(&pool, "Shop", "333", None).await;
    let store = Arc::new(SqlStore::new(pool.clone()));

    let days = [(17, 10, 0.5), (18, 20, 0.6), (19, 30, 0.7)];
    for (day, sessions, engagement) in days {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let totals = DailyTotals {
            sessions,
            engagement_rate: engagement,
            ..Default::default()
        };
        let calendar = CalendarFields::from_date(date);
        let snapshot = DailySnapshot::new(site.id, calendar, &totals, None, None, vec![]);
        store.upsert_snapshot(&snapshot).await.unwrap();
    }

    // No registered source data: collection fails for the site, aggregation still runs.
    let report = pipeline::run_with(Arc::new(ScriptedSource::default()), store, options()).await;
    assert_eq!(report.collect.failed, 1);

    let weekly = db::list_period_aggregates(&pool, Period::Weekly).await.unwrap();
    assert_eq!(weekly.len(), 1);
    assert_eq!((weekly[0].year, weekly[0].unit), (2025, Some(12)));
    assert_eq!(weekly[0].sessions, 60);
    assert!((weekly[0].engagement_rate - 0.6).abs() < 1e-9);

    let quarterly = db::list_period_aggregates(&pool, Period::Quarterly).await.unwrap();
    assert_eq!(quarterly[0].unit, Some(1));
}
