//! Availability reconciliation engine
//!
//! Walks persisted media records and demotes the ones whose content is no
//! longer present on the media server or in the fulfillment services.

pub mod cache;
pub mod movie;
pub mod orchestrator;
pub mod series;
pub mod session;
pub mod sources;
pub mod transition;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{AvailabilitySync, RunOutcome, SyncError};
