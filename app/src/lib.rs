//! # KiwiScript App
//!
//! Wiring for the `kiwiscript` binary: configuration, tracing, the Postgres store and the
//! maintenance commands.
//!
//! ```text
//! kiwiscript migrate
//! kiwiscript reconcile [--series-id <ID>] [--json]
//! ```

use anyhow::Context as _;
use kiwiscript_core::SeriesId;
use kiwiscript_postgres::PostgresCourseStore;
use kiwiscript_runtime::{ContentService, DriftReport};
use tracing::{info, warn};

pub mod cli;
pub mod config;
pub mod telemetry;

use cli::Command;
use config::Config;

/// Run `command` against the configured database.
///
/// # Errors
///
/// Fails if the database is unreachable or the command fails.
pub async fn run(config: &Config, command: Command) -> anyhow::Result<()> {
    let store = PostgresCourseStore::connect(&config.database)
        .await
        .context("connect to database")?;

    match command {
        Command::Migrate => store.migrate().await.context("migrate")?,
        Command::Reconcile { series_id, json } => {
            let reports = reconcile(store, series_id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&reports).context("encode reports")?
                );
            }
        }
    }
    Ok(())
}

async fn reconcile(
    store: PostgresCourseStore,
    series_id: Option<i32>,
) -> anyhow::Result<Vec<DriftReport>> {
    let content = ContentService::new(store);
    let reports = match series_id {
        Some(id) => vec![
            content
                .reconcile_series(SeriesId::new(id))
                .await
                .with_context(|| format!("reconcile series {id}"))?,
        ],
        None => content.reconcile_all().await.context("reconcile")?,
    };

    for report in reports.iter().filter(|report| !report.is_clean()) {
        warn!(
            series_id = %report.series_id,
            series = ?report.series,
            sections = report.sections.len(),
            "Aggregates drifted"
        );
    }
    info!(series = reports.len(), "Reconciliation complete");
    Ok(reports)
}
