//! Wire types for the GA4 Data API `runReport` call and their conversion
//! into domain values.

use serde::{Deserialize, Serialize};

use crate::domain::{DailyTotals, DateRange, PageMetrics, TrafficSourceEntry};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Named {
    pub name: String,
}

impl Named {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricOrder {
    pub metric_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBy {
    pub metric: MetricOrder,
    pub desc: bool,
}

impl OrderBy {
    pub fn desc(metric_name: &str) -> Self {
        Self {
            metric: MetricOrder {
                metric_name: metric_name.to_string(),
            },
            desc: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub date_ranges: Vec<DateRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Named>,
    pub metrics: Vec<Named>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_bys: Vec<OrderBy>,
}

impl ReportRequest {
    fn new(range: &DateRange, dimensions: &[&str], metrics: &[&str]) -> Self {
        Self {
            date_ranges: vec![range.clone()],
            dimensions: dimensions.iter().map(|d| Named::new(d)).collect(),
            metrics: metrics.iter().map(|m| Named::new(m)).collect(),
            limit: None,
            order_bys: Vec::new(),
        }
    }

    fn ranked(mut self, metric_name: &str, limit: u32) -> Self {
        self.limit = Some(limit);
        self.order_bys = vec![OrderBy::desc(metric_name)];
        self
    }

    pub fn daily_totals(range: &DateRange) -> Self {
        Self::new(
            range,
            &[],
            &[
                "activeUsers",
                "sessions",
                "screenPageViews",
                "averageSessionDuration",
                "engagementRate",
                "newUsers",
            ],
        )
    }

    pub fn top_dimension(dimension: &str, range: &DateRange) -> Self {
        Self::new(range, &[dimension], &["sessions"]).ranked("sessions", 1)
    }

    pub fn top_pages(range: &DateRange, limit: u32) -> Self {
        Self::new(
            range,
            &["pagePath", "pageTitle"],
            &[
                "screenPageViews",
                "averageSessionDuration",
                "bounceRate",
                "entrances",
            ],
        )
        .ranked("screenPageViews", limit)
    }

    pub fn traffic_sources(range: &DateRange, limit: u32) -> Self {
        Self::new(
            range,
            &["sessionDefaultChannelGrouping", "sessionSource"],
            &["sessions", "newUsers"],
        )
        .ranked("sessions", limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Value {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<Value>,
    #[serde(default)]
    pub metric_values: Vec<Value>,
}

impl ReportRow {
    pub fn dimension(&self, index: usize) -> Option<&str> {
        self.dimension_values
            .get(index)
            .and_then(|v| v.value.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Integer metric; missing or unparseable values read as 0 and
    /// fractional values are truncated.
    pub fn metric_i64(&self, index: usize) -> i64 {
        self.metric_raw(index)
            .and_then(|v| {
                v.parse::<i64>()
                    .ok()
                    .or_else(|| v.parse::<f64>().ok().map(|f| f.trunc() as i64))
            })
            .unwrap_or(0)
    }

    pub fn metric_f64(&self, index: usize) -> f64 {
        self.metric_raw(index)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|f| f.is_finite())
            .unwrap_or(0.0)
    }

    fn metric_raw(&self, index: usize) -> Option<&str> {
        self.metric_values
            .get(index)
            .and_then(|v| v.value.as_deref())
            .map(str::trim)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

impl ReportResponse {
    pub fn daily_totals(&self) -> DailyTotals {
        let Some(row) = self.rows.first() else {
            return DailyTotals::default();
        };
        DailyTotals {
            active_users: row.metric_i64(0),
            sessions: row.metric_i64(1),
            pageviews: row.metric_i64(2),
            avg_session_duration: row.metric_f64(3),
            engagement_rate: row.metric_f64(4),
            new_users: row.metric_i64(5),
        }
    }

    pub fn top_dimension_value(&self) -> Option<String> {
        self.rows
            .first()
            .and_then(|row| row.dimension(0))
            .map(str::to_string)
    }

    pub fn pages(&self) -> Vec<PageMetrics> {
        self.rows
            .iter()
            .map(|row| PageMetrics {
                path: row.dimension(0).unwrap_or_default().to_string(),
                title: row.dimension(1).unwrap_or_default().to_string(),
                pageviews: row.metric_i64(0),
                avg_time: row.metric_f64(1),
                bounce_rate: row.metric_f64(2),
                entrances: row.metric_i64(3),
            })
            .collect()
    }

    pub fn traffic_sources(&self) -> Vec<TrafficSourceEntry> {
        self.rows
            .iter()
            .map(|row| TrafficSourceEntry {
                channel: row.dimension(0).unwrap_or("Unknown").to_string(),
                source: row.dimension(1).unwrap_or("Unknown").to_string(),
                sessions: row.metric_i64(0),
                new_users: row.metric_i64(1),
            })
            .collect()
    }
}
