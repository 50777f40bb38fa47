//! Per-run state threaded through every resolver call

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::cache::LookupCache;
use super::transition::Applied;

/// Counters for one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Records looked at
    pub examined: usize,
    /// Records written back
    pub updated: usize,
    /// Records skipped because of an error
    pub failed: usize,
    pub variants_deleted: usize,
    pub seasons_deleted: usize,
    pub parents_demoted: usize,
}

impl RunStats {
    pub fn record_applied(&mut self, applied: Applied) {
        self.updated += 1;
        self.variants_deleted += applied.variants_deleted;
        self.seasons_deleted += applied.seasons_deleted;
        self.parents_demoted += applied.parents_demoted;
    }
}

/// Everything a single run owns. Dropped when the run ends.
#[derive(Debug)]
pub struct SyncSession {
    pub id: Uuid,
    pub cache: LookupCache,
    pub cancel: CancellationToken,
    pub stats: RunStats,
}

impl SyncSession {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            cache: LookupCache::new(),
            cancel,
            stats: RunStats::default(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
