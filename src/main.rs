//! Availability sync - reconciles persisted media availability
//!
//! Periodically checks every available movie and series against Plex, Radarr
//! and Sonarr, and marks variants and seasons that disappeared as deleted.

mod cli;
mod config;
mod db;
mod jobs;
mod services;
mod sync;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::CliOptions;
use crate::config::Config;
use crate::db::Database;
use crate::sync::{AvailabilitySync, RunOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let options = CliOptions::from_args();
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "availability_sync=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.pretty_logs {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }

    tracing::info!("Starting availability sync");

    let db = Database::connect(&config.database_path, config.database_max_connections).await?;
    db.migrate().await?;
    tracing::info!(path = %config.database_path, "Database connected");

    let sources = services::build_sources(&config)?;
    let sync = Arc::new(AvailabilitySync::new(
        Arc::new(db),
        sources,
        config.page_size,
    ));

    if options.once {
        let run = tokio::spawn({
            let sync = sync.clone();
            async move { sync.run().await }
        });
        tokio::pin!(run);

        let result = tokio::select! {
            result = &mut run => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, finishing current record");
                sync.cancel();
                run.await?
            }
        };

        let status = serde_json::to_string(&sync.status())?;
        tracing::info!(status = %status, "Availability sync finished");

        return match result {
            Ok(RunOutcome::Completed(_)) | Ok(RunOutcome::Aborted(_)) => Ok(()),
            Err(e) => Err(e.into()),
        };
    }

    let cron = options.cron_override.unwrap_or(config.sync_cron);
    let mut scheduler = jobs::start_scheduler(sync.clone(), &cron).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");
    sync.cancel();
    scheduler.shutdown().await?;

    Ok(())
}
