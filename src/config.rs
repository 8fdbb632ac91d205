use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::DateRange;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: Option<String>,
    pub database_path: Option<String>,

    /// Service-account key, inline JSON. Takes precedence over `credentials_path`.
    pub credentials_json: Option<String>,
    pub credentials_path: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Overrides the token endpoint named in the service-account key.
    pub token_url: Option<String>,

    #[serde(default = "default_date_range_start")]
    pub date_range_start: String,

    #[serde(default = "default_date_range_end")]
    pub date_range_end: String,

    #[serde(default = "default_top_pages_limit")]
    pub top_pages_limit: u32,

    #[serde(default = "default_traffic_sources_limit")]
    pub traffic_sources_limit: u32,

    #[serde(default = "default_excluded_path_fragments")]
    pub excluded_path_fragments: Vec<String>,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_token_cache_ttl")]
    pub token_cache_ttl_secs: u64,

    #[serde(default = "default_run_budget")]
    pub run_budget_secs: u64,
}

fn default_api_base_url() -> String {
    "https://analyticsdata.googleapis.com".to_string()
}

fn default_date_range_start() -> String {
    "1daysAgo".to_string()
}

fn default_date_range_end() -> String {
    "today".to_string()
}

fn default_top_pages_limit() -> u32 {
    20
}

fn default_traffic_sources_limit() -> u32 {
    10
}

fn default_excluded_path_fragments() -> Vec<String> {
    vec!["/admin".to_string(), "/.well-known".to_string()]
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8000
}

fn default_http_timeout() -> u64 {
    30
}

fn default_token_cache_ttl() -> u64 {
    3000 // tokens live 3600s
}

fn default_run_budget() -> u64 {
    1800
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .add_source(
                Environment::with_prefix("GA4ROLLUP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("excluded_path_fragments")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(&self.date_range_start, &self.date_range_end)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }

    /// Connection string for the record store, falling back to a local SQLite file.
    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .or_else(|| {
                self.database_path
                    .as_ref()
                    .map(|p| format!("sqlite:{}?mode=rwc", p))
            })
            .unwrap_or_else(|| {
                #[cfg(feature = "postgres")]
                {
                    "postgres://localhost/ga4_rollup".to_string()
                }
                #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
                {
                    "sqlite:ga4_rollup.db?mode=rwc".to_string()
                }
            })
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        database_url: None,
        database_path: Some("test.db".to_string()),
        credentials_json: None,
        credentials_path: None,
        api_base_url: default_api_base_url(),
        token_url: None,
        date_range_start: default_date_range_start(),
        date_range_end: default_date_range_end(),
        top_pages_limit: 20,
        traffic_sources_limit: 10,
        excluded_path_fragments: default_excluded_path_fragments(),
        retry_attempts: 3,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 4,
        http_timeout_secs: 5,
        token_cache_ttl_secs: 60,
        run_budget_secs: 60,
    }
}
