//! Availability sync job
//!
//! Runs one reconciliation pass. A pass that is still going when the next
//! tick fires is left alone; the tick is skipped.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::sync::{AvailabilitySync, RunOutcome, SyncError};

/// Run one availability sync pass, treating an overlapping run as a skip
pub async fn run_availability_sync(sync: Arc<AvailabilitySync>) -> Result<Option<RunOutcome>> {
    match sync.run().await {
        Ok(outcome) => {
            if let RunOutcome::Aborted(stats) = &outcome {
                warn!(
                    job = "availability_sync",
                    examined = stats.examined,
                    "Availability sync stopped before finishing"
                );
            }
            Ok(Some(outcome))
        }
        Err(SyncError::AlreadyRunning) => {
            info!(job = "availability_sync", "Previous run still active, skipping");
            Ok(None)
        }
        Err(SyncError::Failed(e)) => Err(e),
    }
}
