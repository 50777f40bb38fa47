//! Collaborators consulted by the sync engine
//!
//! Adapters report `Ok(Some(_))` when the remote side knows the item,
//! `Ok(None)` for a definite not-found and `Err(_)` for anything transient.
//! The resolvers fold those into a [Probe].

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::FulfillmentServerConfig;

use super::types::{MediaRecord, Variant};

/// Result of asking one authority whether something exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Present,
    Absent,
    /// The authority could not be reached or answered garbage
    Indeterminate,
}

impl Probe {
    /// Fold an adapter result, `present` deciding whether a found item counts.
    pub fn from_lookup<T>(
        lookup: &Result<Option<T>>,
        source: &str,
        present: impl FnOnce(&T) -> bool,
    ) -> Self {
        match lookup {
            Ok(Some(item)) if present(item) => Probe::Present,
            Ok(_) => Probe::Absent,
            Err(e) => {
                debug!(source = source, error = %e, "Probe failed, treating as absent");
                Probe::Indeterminate
            }
        }
    }

    /// Indeterminate is folded into absence; there is no retry.
    pub fn exists(self) -> bool {
        matches!(self, Probe::Present)
    }
}

/// Item returned by the media server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaServerItem {
    pub rating_key: String,
}

/// Child entry (season) of a media server item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaServerChild {
    /// Season number for seasons
    pub index: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfilledMovie {
    pub has_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonStatistics {
    pub season_number: i32,
    pub episode_file_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfilledSeries {
    pub episode_file_count: i64,
    pub seasons: Vec<SeasonStatistics>,
}

impl FulfilledSeries {
    /// Whether the season has at least one episode file on disk
    pub fn season_has_files(&self, season_number: i32) -> bool {
        self.seasons
            .iter()
            .any(|s| s.season_number == season_number && s.episode_file_count > 0)
    }
}

/// Catalog/playback server (Plex)
#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn item(&self, rating_key: &str) -> Result<Option<MediaServerItem>>;

    async fn children(&self, rating_key: &str) -> Result<Option<Vec<MediaServerChild>>>;
}

/// Movie fulfillment service instance (Radarr)
#[async_trait]
pub trait MovieFulfillment: Send + Sync {
    fn server(&self) -> &FulfillmentServerConfig;

    async fn movie(&self, external_id: i64) -> Result<Option<FulfilledMovie>>;
}

/// Series fulfillment service instance (Sonarr)
#[async_trait]
pub trait SeriesFulfillment: Send + Sync {
    fn server(&self) -> &FulfillmentServerConfig;

    async fn series(&self, external_id: i64) -> Result<Option<FulfilledSeries>>;
}

/// Persistence contract used by the engine
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Records present in at least one variant, ordered by id
    async fn load_eligible_page(&self, offset: i64, limit: i64) -> Result<Vec<MediaRecord>>;

    async fn save(&self, record: &MediaRecord) -> Result<()>;

    async fn has_approved_unfulfilled_request(&self, media_id: i64, variant: Variant)
    -> Result<bool>;
}

/// All remote authorities for one engine instance
#[derive(Clone)]
pub struct Sources {
    pub media_server: Arc<dyn MediaServer>,
    pub movie_servers: Vec<Arc<dyn MovieFulfillment>>,
    pub series_servers: Vec<Arc<dyn SeriesFulfillment>>,
}

fn serves(server: &FulfillmentServerConfig, variant: Variant) -> bool {
    server.sync_enabled && server.is_4k == variant.is_enhanced()
}

impl Sources {
    /// Sync-enabled movie servers for the variant
    pub fn movie_servers_for(
        &self,
        variant: Variant,
    ) -> impl Iterator<Item = &Arc<dyn MovieFulfillment>> {
        self.movie_servers
            .iter()
            .filter(move |s| serves(s.server(), variant))
    }

    /// Sync-enabled series servers for the variant
    pub fn series_servers_for(
        &self,
        variant: Variant,
    ) -> impl Iterator<Item = &Arc<dyn SeriesFulfillment>> {
        self.series_servers
            .iter()
            .filter(move |s| serves(s.server(), variant))
    }
}
