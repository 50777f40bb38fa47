//! Availability sync run lifecycle
//!
//! One run walks every eligible record page by page, resolves which variants
//! (and seasons) still exist, applies the downgrade rules and writes back only
//! records that actually changed. Failures on one record are logged and
//! skipped; only cancellation or a failure to read the store ends a run early.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::movie::resolve_movie;
use super::series::resolve_series;
use super::session::{RunStats, SyncSession};
use super::sources::{AvailabilityStore, Sources};
use super::transition::{self, Applied, LinkagePolicy};
use super::types::{MediaKind, MediaRecord, Variant};

/// Default number of records loaded per page
pub const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("an availability sync is already running")]
    AlreadyRunning,
    #[error("availability sync failed: {0:#}")]
    Failed(#[source] anyhow::Error),
}

/// How a run that was allowed to start ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "stats", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunStats),
    /// Cancelled between records
    Aborted(RunStats),
}

impl RunOutcome {
    pub fn stats(&self) -> &RunStats {
        match self {
            RunOutcome::Completed(stats) | RunOutcome::Aborted(stats) => stats,
        }
    }
}

/// Summary of the last finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when the run failed
    pub outcome: Option<RunOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub running: bool,
    pub last_run: Option<RunSummary>,
}

/// Releases the process-wide run flag on drop, whatever way the run ends
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reconciles persisted availability against Plex, Radarr and Sonarr
pub struct AvailabilitySync {
    store: Arc<dyn AvailabilityStore>,
    sources: Sources,
    page_size: i64,
    running: AtomicBool,
    /// Token of the active run, if any
    cancel: Mutex<Option<CancellationToken>>,
    last_run: Mutex<Option<RunSummary>>,
}

impl AvailabilitySync {
    pub fn new(store: Arc<dyn AvailabilityStore>, sources: Sources, page_size: i64) -> Self {
        Self {
            store,
            sources,
            page_size: if page_size > 0 { page_size } else { DEFAULT_PAGE_SIZE },
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            last_run: Mutex::new(None),
        }
    }

    /// Run one full reconciliation pass.
    ///
    /// Fails fast with [SyncError::AlreadyRunning] if a pass is in progress.
    pub async fn run(&self) -> Result<RunOutcome, SyncError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!(job = "availability_sync", "Sync already running, refusing to start");
            return Err(SyncError::AlreadyRunning);
        };

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());
        let mut session = SyncSession::new(token);
        let started_at = Utc::now();

        info!(
            job = "availability_sync",
            session_id = %session.id,
            page_size = self.page_size,
            movie_servers = self.sources.movie_servers.len(),
            series_servers = self.sources.series_servers.len(),
            "Starting availability sync"
        );

        let result = self.run_session(&mut session).await;
        self.cancel.lock().take();

        match &result {
            Ok(RunOutcome::Completed(stats)) => info!(
                job = "availability_sync",
                session_id = %session.id,
                examined = stats.examined,
                updated = stats.updated,
                failed = stats.failed,
                variants_deleted = stats.variants_deleted,
                seasons_deleted = stats.seasons_deleted,
                parents_demoted = stats.parents_demoted,
                cached_lookups = session.cache.len(),
                "Availability sync complete"
            ),
            Ok(RunOutcome::Aborted(stats)) => info!(
                job = "availability_sync",
                session_id = %session.id,
                examined = stats.examined,
                updated = stats.updated,
                "Availability sync aborted"
            ),
            Err(e) => error!(
                job = "availability_sync",
                session_id = %session.id,
                error = %e,
                "Availability sync failed"
            ),
        }

        *self.last_run.lock() = Some(RunSummary {
            session_id: session.id,
            started_at,
            finished_at: Utc::now(),
            outcome: result.as_ref().ok().copied(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });

        result
    }

    /// Ask the active run to stop after the record it is working on.
    pub fn cancel(&self) {
        if let Some(token) = self.cancel.lock().as_ref() {
            info!(job = "availability_sync", "Cancelling availability sync");
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            running: self.is_running(),
            last_run: self.last_run.lock().clone(),
        }
    }

    async fn run_session(&self, session: &mut SyncSession) -> Result<RunOutcome, SyncError> {
        let mut offset = 0;

        // Cancellation is checked before each record, after the page load, so
        // a cancel during the very last record still ends as completed.
        loop {
            let page = self
                .store
                .load_eligible_page(offset, self.page_size)
                .await
                .with_context(|| format!("Failed to load media page at offset {}", offset))
                .map_err(SyncError::Failed)?;

            if page.is_empty() {
                return Ok(RunOutcome::Completed(session.stats));
            }

            debug!(
                session_id = %session.id,
                offset = offset,
                records = page.len(),
                "Processing media page"
            );

            // Records demoted out of the eligible set shift later rows down,
            // so the next offset only skips rows that are still eligible.
            let mut still_eligible = 0;
            for record in page {
                if session.is_cancelled() {
                    return Ok(RunOutcome::Aborted(session.stats));
                }
                session.stats.examined += 1;

                let media_id = record.id;
                match self.sync_record(session, record).await {
                    Ok(eligible) => {
                        if eligible {
                            still_eligible += 1;
                        }
                    }
                    Err(e) => {
                        session.stats.failed += 1;
                        still_eligible += 1;
                        warn!(
                            job = "availability_sync",
                            session_id = %session.id,
                            media_id = media_id,
                            error = %format!("{:#}", e),
                            "Failed to sync media availability"
                        );
                    }
                }
            }
            offset += still_eligible;
        }
    }

    /// Reconcile one record, returning whether it is still eligible afterwards
    async fn sync_record(
        &self,
        session: &mut SyncSession,
        mut record: MediaRecord,
    ) -> anyhow::Result<bool> {
        let loaded = record.clone();
        let mut applied = Applied::default();

        match record.kind {
            MediaKind::Movie => {
                let exists = resolve_movie(&self.sources, session, &record).await;
                for variant in Variant::ALL {
                    if exists[variant] {
                        continue;
                    }
                    applied.merge(self.remove_variant(&mut record, variant).await?);
                }
            }
            MediaKind::Series => {
                let existence = resolve_series(&self.sources, session, &record).await;
                let series_gone = !existence.any();
                for variant in Variant::ALL {
                    if !existence.series[variant] {
                        applied.merge(self.remove_variant(&mut record, variant).await?);
                    }
                    if series_gone {
                        applied.merge(transition::cascade_season_loss(&mut record, variant));
                    } else {
                        applied.merge(transition::apply_season_existence(
                            &mut record,
                            variant,
                            &existence.seasons[variant],
                        ));
                    }
                }
            }
        }

        if record == loaded {
            return Ok(record.is_eligible());
        }

        self.store
            .save(&record)
            .await
            .with_context(|| format!("Failed to save media {}", record.id))?;
        session.stats.record_applied(applied);

        info!(
            job = "availability_sync",
            session_id = %session.id,
            media_id = record.id,
            tmdb_id = ?record.tmdb_id,
            media_type = %record.kind,
            status = %record.variants[Variant::Standard].status,
            status_4k = %record.variants[Variant::Enhanced].status,
            variants_deleted = applied.variants_deleted,
            seasons_deleted = applied.seasons_deleted,
            parent_demoted = applied.parents_demoted > 0,
            "Updated media availability"
        );

        Ok(record.is_eligible())
    }

    /// Mark a variant as gone, keeping its linkage if a request still needs it
    async fn remove_variant(
        &self,
        record: &mut MediaRecord,
        variant: Variant,
    ) -> anyhow::Result<Applied> {
        if !record.tracks(variant) {
            return Ok(Applied::default());
        }

        let policy = if record.variants[variant].status.is_present()
            && self
                .store
                .has_approved_unfulfilled_request(record.id, variant)
                .await
                .context("Failed to check pending requests")?
        {
            debug!(
                media_id = record.id,
                variant = %variant,
                "Approved request pending, keeping linkage"
            );
            LinkagePolicy::Preserve
        } else {
            LinkagePolicy::Clear
        };

        Ok(transition::apply_variant_loss(record, variant, policy))
    }
}
