//! `ksef-pull`: authenticate against KSeF, pull a year (or any range) of
//! invoice metadata in quota-friendly windows, and write an Excel report.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ksef_core::time::{Clock, SystemClock};
use ksef_domain::{AppConfig, SubjectType};
use ksef_infra::report::{write_workbook, RunSummary};
use ksef_infra::{AuthSession, WindowedFetcher};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().context("loading configuration")?;
    info!(
        environment = %config.environment,
        date_from = %config.date_from,
        date_to = %config.date_to,
        page_size = config.page_size,
        "starting pull run"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut session =
        AuthSession::from_config(&config, clock.clone()).context("building session")?;
    session.authenticate().await.context("authenticating")?;

    // Give the freshly issued token a moment to propagate server-side.
    clock.sleep(Duration::from_secs(1)).await;

    let base_url = config.environment.base_url();
    let mut fetcher =
        WindowedFetcher::new(base_url, &mut session, config.page_size, clock.clone())
            .context("building fetcher")?;

    let issued = fetcher
        .fetch_all(SubjectType::Issued, config.date_from, config.date_to)
        .await
        .context("fetching issued invoices")?;
    let received = fetcher
        .fetch_all(SubjectType::Received, config.date_from, config.date_to)
        .await
        .context("fetching received invoices")?;

    let summary = RunSummary {
        nip: config.nip.clone(),
        environment: config.environment.to_string(),
        date_from: config.date_from.to_string(),
        date_to: config.date_to.to_string(),
    };
    write_workbook(Path::new(&config.output_path), &issued, &received, &summary)
        .context("writing report")?;

    info!(
        issued = issued.len(),
        received = received.len(),
        output = %config.output_path,
        "run complete"
    );
    Ok(())
}
