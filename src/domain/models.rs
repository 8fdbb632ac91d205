use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::{PeriodKey, Scope, SiteId};
use crate::calendar::CalendarFields;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub ga4_property_id: String,
    /// `None` counts as enabled; only an explicit `false` turns page collection off.
    pub extended_collection: Option<bool>,
}

impl Site {
    pub fn collects_pages(&self) -> bool {
        self.extended_collection != Some(false)
    }
}

/// Headline metrics for one property over the collection window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub active_users: i64,
    pub sessions: i64,
    pub pageviews: i64,
    pub avg_session_duration: f64,
    pub engagement_rate: f64,
    pub new_users: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub path: String,
    pub title: String,
    pub pageviews: i64,
    pub avg_time: f64,
    pub bounce_rate: f64,
    pub entrances: i64,
}

impl PageMetrics {
    /// Share of pageviews that started a session on this page.
    pub fn entrance_rate(&self) -> f64 {
        if self.pageviews > 0 {
            self.entrances as f64 / self.pageviews as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSourceEntry {
    pub channel: String,
    pub source: String,
    pub sessions: i64,
    pub new_users: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub site_id: SiteId,
    pub snapshot_date: NaiveDate,
    pub scope: Scope,
    pub active_users: i64,
    pub sessions: i64,
    pub pageviews: i64,
    pub avg_session_duration: f64,
    pub engagement_rate: f64,
    pub bounce_rate: f64,
    pub top_device: Option<String>,
    pub top_country: Option<String>,
    pub new_users: i64,
    pub traffic_sources: Vec<TrafficSourceEntry>,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub week: u32,
    pub iso_year: i32,
    pub day: u32,
}

impl DailySnapshot {
    /// Assemble a daily snapshot. Bounce rate is always `1 - engagement_rate`.
    pub fn new(
        site_id: SiteId,
        calendar: CalendarFields,
        totals: &DailyTotals,
        top_device: Option<String>,
        top_country: Option<String>,
        traffic_sources: Vec<TrafficSourceEntry>,
    ) -> Self {
        Self {
            site_id,
            snapshot_date: calendar.date,
            scope: Scope::Daily,
            active_users: totals.active_users,
            sessions: totals.sessions,
            pageviews: totals.pageviews,
            avg_session_duration: totals.avg_session_duration,
            engagement_rate: totals.engagement_rate,
            bounce_rate: 1.0 - totals.engagement_rate,
            top_device,
            top_country,
            new_users: totals.new_users,
            traffic_sources,
            year: calendar.year,
            month: calendar.month,
            quarter: calendar.quarter,
            week: calendar.week,
            iso_year: calendar.iso_year,
            day: calendar.day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePerformanceRecord {
    pub site_id: SiteId,
    pub page_path: String,
    pub page_title: String,
    pub pageviews: i64,
    pub avg_time_on_page: f64,
    pub bounce_rate: f64,
    pub entrance_rate: f64,
    pub date: NaiveDate,
}

impl PagePerformanceRecord {
    pub fn from_metrics(site_id: SiteId, date: NaiveDate, page: &PageMetrics) -> Self {
        Self {
            site_id,
            page_path: page.path.clone(),
            page_title: page.title.clone(),
            pageviews: page.pageviews,
            avg_time_on_page: page.avg_time,
            bounce_rate: page.bounce_rate,
            entrance_rate: page.entrance_rate(),
            date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub site_id: SiteId,
    pub year: i32,
    /// Week, month or quarter number; `None` for yearly rows.
    pub unit: Option<u32>,
    pub sessions: i64,
    pub pageviews: i64,
    pub active_users: i64,
    pub avg_duration: f64,
    pub engagement_rate: f64,
    pub bounce_rate: f64,
}

impl PeriodAggregate {
    pub fn key(&self) -> PeriodKey {
        PeriodKey {
            site_id: self.site_id,
            year: self.year,
            unit: self.unit,
        }
    }
}
