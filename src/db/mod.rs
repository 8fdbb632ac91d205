use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    DailySnapshot, PagePerformanceRecord, Period, PeriodAggregate, Scope, Site, SiteId,
    TrafficSourceEntry,
};
use crate::error::{Error, Result};
use crate::store::RecordStore;

#[cfg(feature = "postgres")]
pub type Pool = sqlx::PgPool;
#[cfg(feature = "postgres")]
pub type PoolOptions = sqlx::postgres::PgPoolOptions;

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub type Pool = sqlx::SqlitePool;
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub type PoolOptions = sqlx::sqlite::SqlitePoolOptions;

pub async fn create_pool(url: &str) -> Result<Pool> {
    let pool = PoolOptions::new().max_connections(10).connect(url).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    #[cfg(feature = "postgres")]
    {
        let sql = include_str!("../../migrations/postgres/001_initial.sql");
        sqlx::raw_sql(sql).execute(pool).await?;
    }

    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    {
        let sql = include_str!("../../migrations/sqlite/001_initial.sql");
        sqlx::raw_sql(sql).execute(pool).await?;
    }

    Ok(())
}

// Bind parameters: PostgreSQL takes native UUID/DATE, SQLite stores TEXT
#[cfg(feature = "postgres")]
fn id_param(id: SiteId) -> uuid::Uuid {
    id.0
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn id_param(id: SiteId) -> String {
    id.0.to_string()
}

#[cfg(feature = "postgres")]
fn date_param(date: NaiveDate) -> NaiveDate {
    date
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// Site queries
pub async fn list_sites(pool: &Pool) -> Result<Vec<Site>> {
    let rows: Vec<SiteRow> = sqlx::query_as(
        "SELECT id, name, ga4_property_id, extended_collection FROM sites ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Site::try_from).collect()
}

/// Register a site. Sites are normally provisioned by an admin process;
/// this exists for local setups and fixtures.
pub async fn insert_site(pool: &Pool, site: &Site) -> Result<()> {
    #[cfg(feature = "postgres")]
    let sql = "INSERT INTO sites (id, name, ga4_property_id, extended_collection) VALUES ($1, $2, $3, $4)";
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    let sql = "INSERT INTO sites (id, name, ga4_property_id, extended_collection) VALUES (?, ?, ?, ?)";

    sqlx::query(sql)
        .bind(id_param(site.id))
        .bind(&site.name)
        .bind(&site.ga4_property_id)
        .bind(site.extended_collection)
        .execute(pool)
        .await?;

    Ok(())
}

// Snapshot queries
#[cfg(feature = "postgres")]
const UPSERT_SNAPSHOT: &str = r#"INSERT INTO ga4_snapshots (site_id, snapshot_date, scope,
    active_users, sessions, pageviews, avg_session_duration, engagement_rate, bounce_rate,
    top_device, top_country, new_users, traffic_sources,
    year, month, quarter, week, iso_year, day)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
    ON CONFLICT (site_id, snapshot_date, scope) DO UPDATE SET
    active_users = EXCLUDED.active_users, sessions = EXCLUDED.sessions,
    pageviews = EXCLUDED.pageviews, avg_session_duration = EXCLUDED.avg_session_duration,
    engagement_rate = EXCLUDED.engagement_rate, bounce_rate = EXCLUDED.bounce_rate,
    top_device = EXCLUDED.top_device, top_country = EXCLUDED.top_country,
    new_users = EXCLUDED.new_users, traffic_sources = EXCLUDED.traffic_sources,
    year = EXCLUDED.year, month = EXCLUDED.month, quarter = EXCLUDED.quarter,
    week = EXCLUDED.week, iso_year = EXCLUDED.iso_year, day = EXCLUDED.day"#;

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
const UPSERT_SNAPSHOT: &str = r#"INSERT INTO ga4_snapshots (site_id, snapshot_date, scope,
    active_users, sessions, pageviews, avg_session_duration, engagement_rate, bounce_rate,
    top_device, top_country, new_users, traffic_sources,
    year, month, quarter, week, iso_year, day)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (site_id, snapshot_date, scope) DO UPDATE SET
    active_users = excluded.active_users, sessions = excluded.sessions,
    pageviews = excluded.pageviews, avg_session_duration = excluded.avg_session_duration,
    engagement_rate = excluded.engagement_rate, bounce_rate = excluded.bounce_rate,
    top_device = excluded.top_device, top_country = excluded.top_country,
    new_users = excluded.new_users, traffic_sources = excluded.traffic_sources,
    year = excluded.year, month = excluded.month, quarter = excluded.quarter,
    week = excluded.week, iso_year = excluded.iso_year, day = excluded.day"#;

pub async fn upsert_snapshot(pool: &Pool, snapshot: &DailySnapshot) -> Result<()> {
    let traffic_sources = serde_json::to_string(&snapshot.traffic_sources)?;

    sqlx::query(UPSERT_SNAPSHOT)
        .bind(id_param(snapshot.site_id))
        .bind(date_param(snapshot.snapshot_date))
        .bind(snapshot.scope.as_str())
        .bind(snapshot.active_users)
        .bind(snapshot.sessions)
        .bind(snapshot.pageviews)
        .bind(snapshot.avg_session_duration)
        .bind(snapshot.engagement_rate)
        .bind(snapshot.bounce_rate)
        .bind(&snapshot.top_device)
        .bind(&snapshot.top_country)
        .bind(snapshot.new_users)
        .bind(traffic_sources)
        .bind(snapshot.year)
        .bind(snapshot.month as i32)
        .bind(snapshot.quarter as i32)
        .bind(snapshot.week as i32)
        .bind(snapshot.iso_year)
        .bind(snapshot.day as i32)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(feature = "postgres")]
const SELECT_SNAPSHOTS: &str = r#"SELECT site_id, snapshot_date, scope, active_users, sessions,
    pageviews, avg_session_duration, engagement_rate, bounce_rate, top_device, top_country,
    new_users, traffic_sources, year, month, quarter, week, iso_year, day
    FROM ga4_snapshots WHERE scope = $1 ORDER BY site_id, snapshot_date"#;

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
const SELECT_SNAPSHOTS: &str = r#"SELECT site_id, snapshot_date, scope, active_users, sessions,
    pageviews, avg_session_duration, engagement_rate, bounce_rate, top_device, top_country,
    new_users, traffic_sources, year, month, quarter, week, iso_year, day
    FROM ga4_snapshots WHERE scope = ? ORDER BY site_id, snapshot_date"#;

pub async fn list_snapshots(pool: &Pool, scope: Scope) -> Result<Vec<DailySnapshot>> {
    let rows: Vec<SnapshotRow> = sqlx::query_as(SELECT_SNAPSHOTS)
        .bind(scope.as_str())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(DailySnapshot::try_from).collect()
}

// Page performance queries
#[cfg(feature = "postgres")]
const UPSERT_PAGE: &str = r#"INSERT INTO page_performance (site_id, page_path, page_title,
    pageviews, avg_time_on_page, bounce_rate, entrance_rate, date)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (site_id, page_path, date) DO UPDATE SET
    page_title = EXCLUDED.page_title, pageviews = EXCLUDED.pageviews,
    avg_time_on_page = EXCLUDED.avg_time_on_page, bounce_rate = EXCLUDED.bounce_rate,
    entrance_rate = EXCLUDED.entrance_rate"#;

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
const UPSERT_PAGE: &str = r#"INSERT INTO page_performance (site_id, page_path, page_title,
    pageviews, avg_time_on_page, bounce_rate, entrance_rate, date)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (site_id, page_path, date) DO UPDATE SET
    page_title = excluded.page_title, pageviews = excluded.pageviews,
    avg_time_on_page = excluded.avg_time_on_page, bounce_rate = excluded.bounce_rate,
    entrance_rate = excluded.entrance_rate"#;

pub async fn upsert_page_performance(pool: &Pool, record: &PagePerformanceRecord) -> Result<()> {
    sqlx::query(UPSERT_PAGE)
        .bind(id_param(record.site_id))
        .bind(&record.page_path)
        .bind(&record.page_title)
        .bind(record.pageviews)
        .bind(record.avg_time_on_page)
        .bind(record.bounce_rate)
        .bind(record.entrance_rate)
        .bind(date_param(record.date))
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_page_performance(
    pool: &Pool,
    site_id: SiteId,
) -> Result<Vec<PagePerformanceRecord>> {
    #[cfg(feature = "postgres")]
    let sql = r#"SELECT site_id, page_path, page_title, pageviews, avg_time_on_page,
        bounce_rate, entrance_rate, date
        FROM page_performance WHERE site_id = $1 ORDER BY date, pageviews DESC, page_path"#;
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    let sql = r#"SELECT site_id, page_path, page_title, pageviews, avg_time_on_page,
        bounce_rate, entrance_rate, date
        FROM page_performance WHERE site_id = ? ORDER BY date, pageviews DESC, page_path"#;

    let rows: Vec<PageRow> = sqlx::query_as(sql)
        .bind(id_param(site_id))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(PagePerformanceRecord::try_from).collect()
}

// Period aggregate queries. Table and column names come from `Period`, never input.
fn period_upsert_sql(period: Period) -> String {
    let mut columns: Vec<&str> = vec!["site_id", "year"];
    columns.extend(period.unit_column());
    columns.extend([
        "sessions",
        "pageviews",
        "active_users",
        "avg_duration",
        "engagement_rate",
        "bounce_rate",
    ]);

    #[cfg(feature = "postgres")]
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    let placeholders: Vec<String> = columns.iter().map(|_| "?".to_string()).collect();

    let conflict = period.conflict_columns();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !conflict.contains(c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    format!(
        "INSERT INTO {table} ({columns}) VALUES ({values}) ON CONFLICT ({conflict}) DO UPDATE SET {updates}",
        table = period.table_name(),
        columns = columns.join(", "),
        values = placeholders.join(", "),
        conflict = conflict.join(", "),
        updates = updates.join(", "),
    )
}

pub async fn upsert_period_aggregate(
    pool: &Pool,
    period: Period,
    aggregate: &PeriodAggregate,
) -> Result<()> {
    let sql = period_upsert_sql(period);

    let mut query = sqlx::query(&sql)
        .bind(id_param(aggregate.site_id))
        .bind(aggregate.year);

    if period.unit_column().is_some() {
        let unit = aggregate.unit.ok_or_else(|| {
            Error::InvalidRow(format!("{} row without a period unit", period.table_name()))
        })?;
        query = query.bind(unit as i32);
    }

    query
        .bind(aggregate.sessions)
        .bind(aggregate.pageviews)
        .bind(aggregate.active_users)
        .bind(aggregate.avg_duration)
        .bind(aggregate.engagement_rate)
        .bind(aggregate.bounce_rate)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_period_aggregates(pool: &Pool, period: Period) -> Result<Vec<PeriodAggregate>> {
    #[cfg(feature = "postgres")]
    let null_unit = "NULL::INTEGER";
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    let null_unit = "NULL";

    let unit = period.unit_column().unwrap_or(null_unit);
    let sql = format!(
        "SELECT site_id, year, {unit} AS unit, sessions, pageviews, active_users, \
         avg_duration, engagement_rate, bounce_rate FROM {table} ORDER BY site_id, year, unit",
        table = period.table_name(),
    );

    let rows: Vec<PeriodRow> = sqlx::query_as(&sql).fetch_all(pool).await?;
    rows.into_iter().map(PeriodAggregate::try_from).collect()
}

/// [`RecordStore`] backed by the SQL pool.
#[derive(Clone)]
pub struct SqlStore {
    pool: Pool,
}

impl SqlStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqlStore {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        list_sites(&self.pool).await
    }

    async fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> Result<()> {
        upsert_snapshot(&self.pool, snapshot).await
    }

    async fn upsert_page_performance(&self, record: &PagePerformanceRecord) -> Result<()> {
        upsert_page_performance(&self.pool, record).await
    }

    async fn list_snapshots(&self, scope: Scope) -> Result<Vec<DailySnapshot>> {
        list_snapshots(&self.pool, scope).await
    }

    async fn upsert_period_aggregate(
        &self,
        period: Period,
        aggregate: &PeriodAggregate,
    ) -> Result<()> {
        upsert_period_aggregate(&self.pool, period, aggregate).await
    }
}

fn unsigned(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidRow(format!("negative {}: {}", column, value)))
}

fn parse_traffic_sources(raw: &str) -> Result<Vec<TrafficSourceEntry>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn parse_site_id(raw: &str) -> Result<SiteId> {
    raw.parse()
        .map_err(|e| Error::InvalidRow(format!("site id {:?}: {}", raw, e)))
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| Error::InvalidRow(format!("date {:?}: {}", raw, e)))
}

// Row types for SQLx mapping - PostgreSQL versions
#[cfg(feature = "postgres")]
#[derive(sqlx::FromRow)]
struct SiteRow {
    id: uuid::Uuid,
    name: String,
    ga4_property_id: String,
    extended_collection: Option<bool>,
}

#[cfg(feature = "postgres")]
impl TryFrom<SiteRow> for Site {
    type Error = Error;

    fn try_from(row: SiteRow) -> Result<Self> {
        Ok(Self {
            id: SiteId(row.id),
            name: row.name,
            ga4_property_id: row.ga4_property_id,
            extended_collection: row.extended_collection,
        })
    }
}

#[cfg(feature = "postgres")]
#[derive(sqlx::FromRow)]
struct SnapshotRow {
    site_id: uuid::Uuid,
    snapshot_date: NaiveDate,
    scope: String,
    active_users: i64,
    sessions: i64,
    pageviews: i64,
    avg_session_duration: f64,
    engagement_rate: f64,
    bounce_rate: f64,
    top_device: Option<String>,
    top_country: Option<String>,
    new_users: i64,
    traffic_sources: String,
    year: i32,
    month: i32,
    quarter: i32,
    week: i32,
    iso_year: i32,
    day: i32,
}

#[cfg(feature = "postgres")]
impl TryFrom<SnapshotRow> for DailySnapshot {
    type Error = Error;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        Ok(Self {
            site_id: SiteId(row.site_id),
            snapshot_date: row.snapshot_date,
            scope: Scope::from_str(&row.scope)
                .ok_or_else(|| Error::InvalidRow(format!("unknown scope {:?}", row.scope)))?,
            active_users: row.active_users,
            sessions: row.sessions,
            pageviews: row.pageviews,
            avg_session_duration: row.avg_session_duration,
            engagement_rate: row.engagement_rate,
            bounce_rate: row.bounce_rate,
            top_device: row.top_device,
            top_country: row.top_country,
            new_users: row.new_users,
            traffic_sources: parse_traffic_sources(&row.traffic_sources)?,
            year: row.year,
            month: unsigned(row.month, "month")?,
            quarter: unsigned(row.quarter, "quarter")?,
            week: unsigned(row.week, "week")?,
            iso_year: row.iso_year,
            day: unsigned(row.day, "day")?,
        })
    }
}

#[cfg(feature = "postgres")]
#[derive(sqlx::FromRow)]
struct PageRow {
    site_id: uuid::Uuid,
    page_path: String,
    page_title: String,
    pageviews: i64,
    avg_time_on_page: f64,
    bounce_rate: f64,
    entrance_rate: f64,
    date: NaiveDate,
}

#[cfg(feature = "postgres")]
impl TryFrom<PageRow> for PagePerformanceRecord {
    type Error = Error;

    fn try_from(row: PageRow) -> Result<Self> {
        Ok(Self {
            site_id: SiteId(row.site_id),
            page_path: row.page_path,
            page_title: row.page_title,
            pageviews: row.pageviews,
            avg_time_on_page: row.avg_time_on_page,
            bounce_rate: row.bounce_rate,
            entrance_rate: row.entrance_rate,
            date: row.date,
        })
    }
}

#[cfg(feature = "postgres")]
#[derive(sqlx::FromRow)]
struct PeriodRow {
    site_id: uuid::Uuid,
    year: i32,
    unit: Option<i32>,
    sessions: i64,
    pageviews: i64,
    active_users: i64,
    avg_duration: f64,
    engagement_rate: f64,
    bounce_rate: f64,
}

#[cfg(feature = "postgres")]
impl TryFrom<PeriodRow> for PeriodAggregate {
    type Error = Error;

    fn try_from(row: PeriodRow) -> Result<Self> {
        Ok(Self {
            site_id: SiteId(row.site_id),
            year: row.year,
            unit: row.unit.map(|u| unsigned(u, "unit")).transpose()?,
            sessions: row.sessions,
            pageviews: row.pageviews,
            active_users: row.active_users,
            avg_duration: row.avg_duration,
            engagement_rate: row.engagement_rate,
            bounce_rate: row.bounce_rate,
        })
    }
}

// Row types for SQLx mapping - SQLite versions (UUIDs and dates stored as TEXT)
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
#[derive(sqlx::FromRow)]
struct SiteRow {
    id: String,
    name: String,
    ga4_property_id: String,
    extended_collection: Option<bool>,
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
impl TryFrom<SiteRow> for Site {
    type Error = Error;

    fn try_from(row: SiteRow) -> Result<Self> {
        Ok(Self {
            id: parse_site_id(&row.id)?,
            name: row.name,
            ga4_property_id: row.ga4_property_id,
            extended_collection: row.extended_collection,
        })
    }
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
#[derive(sqlx::FromRow)]
struct SnapshotRow {
    site_id: String,
    snapshot_date: String,
    scope: String,
    active_users: i64,
    sessions: i64,
    pageviews: i64,
    avg_session_duration: f64,
    engagement_rate: f64,
    bounce_rate: f64,
    top_device: Option<String>,
    top_country: Option<String>,
    new_users: i64,
    traffic_sources: String,
    year: i32,
    month: i32,
    quarter: i32,
    week: i32,
    iso_year: i32,
    day: i32,
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
impl TryFrom<SnapshotRow> for DailySnapshot {
    type Error = Error;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        Ok(Self {
            site_id: parse_site_id(&row.site_id)?,
            snapshot_date: parse_date(&row.snapshot_date)?,
            scope: Scope::from_str(&row.scope)
                .ok_or_else(|| Error::InvalidRow(format!("unknown scope {:?}", row.scope)))?,
            active_users: row.active_users,
            sessions: row.sessions,
            pageviews: row.pageviews,
            avg_session_duration: row.avg_session_duration,
            engagement_rate: row.engagement_rate,
            bounce_rate: row.bounce_rate,
            top_device: row.top_device,
            top_country: row.top_country,
            new_users: row.new_users,
            traffic_sources: parse_traffic_sources(&row.traffic_sources)?,
            year: row.year,
            month: unsigned(row.month, "month")?,
            quarter: unsigned(row.quarter, "quarter")?,
            week: unsigned(row.week, "week")?,
            iso_year: row.iso_year,
            day: unsigned(row.day, "day")?,
        })
    }
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
#[derive(sqlx::FromRow)]
struct PageRow {
    site_id: String,
    page_path: String,
    page_title: String,
    pageviews: i64,
    avg_time_on_page: f64,
    bounce_rate: f64,
    entrance_rate: f64,
    date: String,
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
impl TryFrom<PageRow> for PagePerformanceRecord {
    type Error = Error;

    fn try_from(row: PageRow) -> Result<Self> {
        Ok(Self {
            site_id: parse_site_id(&row.site_id)?,
            page_path: row.page_path,
            page_title: row.page_title,
            pageviews: row.pageviews,
            avg_time_on_page: row.avg_time_on_page,
            bounce_rate: row.bounce_rate,
            entrance_rate: row.entrance_rate,
            date: parse_date(&row.date)?,
        })
    }
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
#[derive(sqlx::FromRow)]
struct PeriodRow {
    site_id: String,
    year: i32,
    unit: Option<i32>,
    sessions: i64,
    pageviews: i64,
    active_users: i64,
    avg_duration: f64,
    engagement_rate: f64,
    bounce_rate: f64,
}

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
impl TryFrom<PeriodRow> for PeriodAggregate {
    type Error = Error;

    fn try_from(row: PeriodRow) -> Result<Self> {
        Ok(Self {
            site_id: parse_site_id(&row.site_id)?,
            year: row.year,
            unit: row.unit.map(|u| unsigned(u, "unit")).transpose()?,
            sessions: row.sessions,
            pageviews: row.pageviews,
            active_users: row.active_users,
            avg_duration: row.avg_duration,
            engagement_rate: row.engagement_rate,
            bounce_rate: row.bounce_rate,
        })
    }
}
