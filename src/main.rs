use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ga4_rollup::{config::Settings, db, db::SqlStore, pipeline, source::Ga4Client};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    info!("Connecting to database...");
    let pool = db::create_pool(&settings.database_url()).await?;
    info!("Database connected");

    info!("Running migrations...");
    db::run_migrations(&pool).await?;
    info!("Migrations complete");

    let source = Ga4Client::from_settings(&settings)?;
    let store = SqlStore::new(pool);

    let report = pipeline::run_once(Arc::new(source), Arc::new(store), &settings).await;

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            failures = report.failures(),
            failed_sites = report.collect.failed,
            skipped_sites = report.collect.skipped,
            aggregate_errors = report.aggregate.errors,
            "Run finished with failures"
        );
        Ok(ExitCode::FAILURE)
    }
}
