use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::auth::{ServiceAccountKey, TokenProvider};
use super::report::{ReportRequest, ReportResponse};
use super::retry::RetryPolicy;
use super::MetricsSource;
use crate::cache::TokenCache;
use crate::config::Settings;
use crate::domain::{DailyTotals, DateRange, PageMetrics, TrafficSourceEntry};
use crate::error::{Error, Result};

/// GA4 Data API client (`v1beta` `runReport`).
#[derive(Clone)]
pub struct Ga4Client {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenProvider,
    retry: RetryPolicy,
}

impl Ga4Client {
    pub fn new(
        base_url: &str,
        key: ServiceAccountKey,
        token_url: Option<String>,
        timeout: Duration,
        cache: TokenCache,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        // A trailing slash keeps `join` from dropping the last path segment.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        let tokens = TokenProvider::new(key, token_url, http.clone(), cache);

        Ok(Self {
            http,
            base_url,
            tokens,
            retry,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let key = match (&settings.credentials_json, &settings.credentials_path) {
            (Some(json), _) => ServiceAccountKey::from_json(json)?,
            (None, Some(path)) => ServiceAccountKey::from_file(path)?,
            (None, None) => {
                return Err(Error::Credentials(
                    "set GA4ROLLUP__CREDENTIALS_JSON or GA4ROLLUP__CREDENTIALS_PATH".to_string(),
                ))
            }
        };

        Self::new(
            &settings.api_base_url,
            key,
            settings.token_url.clone(),
            Duration::from_secs(settings.http_timeout_secs),
            TokenCache::new(settings),
            RetryPolicy::from_settings(settings),
        )
    }

    pub fn report_url(&self, property_id: &str) -> Result<Url> {
        let id = property_id.trim().trim_start_matches("properties/");
        Ok(self
            .base_url
            .join(&format!("v1beta/properties/{}:runReport", id))?)
    }

    pub async fn run_report(
        &self,
        property_id: &str,
        request: &ReportRequest,
    ) -> Result<ReportResponse> {
        self.retry
            .run("runReport", || self.run_report_once(property_id, request))
            .await
    }

    async fn run_report_once(
        &self,
        property_id: &str,
        request: &ReportRequest,
    ) -> Result<ReportResponse> {
        let url = self.report_url(property_id)?;
        let token = self.tokens.access_token().await?;

        debug!(property_id, url = %url, "Running report");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => {
                self.tokens.reset().await;
                Err(Error::Unauthorized(message))
            }
            403 => {
                warn!(property_id, "Service account has no access to property");
                Err(Error::Unauthorized(message))
            }
            code => Err(Error::Api {
                status: code,
                message,
            }),
        }
    }
}

#[async_trait]
impl MetricsSource for Ga4Client {
    async fn fetch_daily_totals(
        &self,
        property_id: &str,
        range: &DateRange,
    ) -> Result<DailyTotals> {
        let response = self
            .run_report(property_id, &ReportRequest::daily_totals(range))
            .await?;
        Ok(response.daily_totals())
    }

    async fn fetch_top_dimension_value(
        &self,
        property_id: &str,
        dimension: &str,
        range: &DateRange,
    ) -> Result<Option<String>> {
        let response = self
            .run_report(property_id, &ReportRequest::top_dimension(dimension, range))
            .await?;
        Ok(response.top_dimension_value())
    }

    async fn fetch_top_pages(
        &self,
        property_id: &str,
        range: &DateRange,
        limit: u32,
    ) -> Result<Vec<PageMetrics>> {
        let response = self
            .run_report(property_id, &ReportRequest::top_pages(range, limit))
            .await?;
        Ok(response.pages())
    }

    async fn fetch_traffic_sources(
        &self,
        property_id: &str,
        range: &DateRange,
        limit: u32,
    ) -> Result<Vec<TrafficSourceEntry>> {
        let response = self
            .run_report(property_id, &ReportRequest::traffic_sources(range, limit))
            .await?;
        Ok(response.traffic_sources())
    }
}
