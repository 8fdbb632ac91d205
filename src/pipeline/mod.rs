use std::sync::Arc;
use tracing::info;

use crate::aggregator::{AggregateReport, Aggregator};
use crate::collector::{CollectOptions, CollectReport, Collector};
use crate::config::Settings;
use crate::source::MetricsSource;
use crate::store::RecordStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub collect: CollectReport,
    pub aggregate: AggregateReport,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.collect.failures() + self.aggregate.failures()
    }

    pub fn is_clean(&self) -> bool {
        self.failures() == 0
    }
}

/// One full run: collect every site, then rebuild the period tables.
/// The aggregator runs even when collection was cut short.
pub async fn run_once(
    source: Arc<dyn MetricsSource>,
    store: Arc<dyn RecordStore>,
    settings: &Settings,
) -> RunReport {
    run_with(source, store, CollectOptions::from_settings(settings)).await
}

pub async fn run_with(
    source: Arc<dyn MetricsSource>,
    store: Arc<dyn RecordStore>,
    options: CollectOptions,
) -> RunReport {
    let collect = Collector::new(source, store.clone(), options).run().await;
    let aggregate = Aggregator::new(store).run().await;

    let report = RunReport { collect, aggregate };
    info!(failures = report.failures(), "Run complete");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_add_up() {
        let report = RunReport {
            collect: CollectReport {
                failed: 1,
                page_errors: 2,
                ..Default::default()
            },
            aggregate: AggregateReport {
                errors: 3,
                ..Default::default()
            },
        };
        assert_eq!(report.failures(), 6);
        assert!(!report.is_clean());
        assert!(RunReport::default().is_clean());
    }
}
