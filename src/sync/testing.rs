//! In-memory collaborators for engine tests
//!
//! Fakes are cheap to clone and clones share their call counters, so a test
//! can hand one copy to the engine and keep another for assertions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::FulfillmentServerConfig;

use super::sources::{
    AvailabilityStore, FulfilledMovie, FulfilledSeries, MediaServer, MediaServerChild,
    MediaServerItem, MovieFulfillment, SeasonStatistics, SeriesFulfillment, Sources,
};
use super::types::{
    LinkFields, Linkage, MediaKind, MediaRecord, MediaStatus, PerVariant, SeasonRecord, Variant,
    VariantState,
};

type Hook = Arc<dyn Fn() + Send + Sync>;

fn server_config(id: i64, is_4k: bool) -> FulfillmentServerConfig {
    FulfillmentServerConfig {
        id,
        name: format!("server-{}", id),
        base_url: format!("http://server-{}", id),
        api_key: "key".to_string(),
        is_4k,
        sync_enabled: true,
    }
}

#[derive(Clone, Default)]
pub struct FakeMediaServer {
    items: HashSet<String>,
    children: HashMap<String, Vec<i32>>,
    failing: bool,
    item_calls: Arc<AtomicUsize>,
    children_calls: Arc<Mutex<HashMap<String, usize>>>,
    on_item: Arc<Mutex<Option<Hook>>>,
}

impl FakeMediaServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, rating_keys: &[&str]) -> Self {
        self.items.extend(rating_keys.iter().map(|k| k.to_string()));
        self
    }

    pub fn with_children(mut self, rating_key: &str, seasons: &[i32]) -> Self {
        self.children.insert(rating_key.to_string(), seasons.to_vec());
        self
    }

    /// Every call errors, as if the server were down
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Run `hook` on every item lookup
    pub fn set_on_item(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_item.lock() = Some(Arc::new(hook));
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    pub fn children_calls(&self, rating_key: &str) -> usize {
        self.children_calls
            .lock()
            .get(rating_key)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MediaServer for FakeMediaServer {
    async fn item(&self, rating_key: &str) -> Result<Option<MediaServerItem>> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_item.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
        if self.failing {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.items.contains(rating_key).then(|| MediaServerItem {
            rating_key: rating_key.to_string(),
        }))
    }

    async fn children(&self, rating_key: &str) -> Result<Option<Vec<MediaServerChild>>> {
        *self
            .children_calls
            .lock()
            .entry(rating_key.to_string())
            .or_insert(0) += 1;
        if self.failing {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.children.get(rating_key).map(|seasons| {
            seasons
                .iter()
                .map(|n| MediaServerChild { index: Some(*n) })
                .collect()
        }))
    }
}

#[derive(Clone)]
pub struct FakeMovieServer {
    config: FulfillmentServerConfig,
    movies: HashMap<i64, bool>,
    failing: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeMovieServer {
    pub fn new(id: i64, is_4k: bool) -> Self {
        Self {
            config: server_config(id, is_4k),
            movies: HashMap::new(),
            failing: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_movie(mut self, external_id: i64, has_file: bool) -> Self {
        self.movies.insert(external_id, has_file);
        self
    }

    pub fn sync_disabled(mut self) -> Self {
        self.config.sync_enabled = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MovieFulfillment for FakeMovieServer {
    fn server(&self) -> &FulfillmentServerConfig {
        &self.config
    }

    async fn movie(&self, external_id: i64) -> Result<Option<FulfilledMovie>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(anyhow!("request timed out"));
        }
        Ok(self
            .movies
            .get(&external_id)
            .map(|has_file| FulfilledMovie { has_file: *has_file }))
    }
}

#[derive(Clone)]
pub struct FakeSeriesServer {
    config: FulfillmentServerConfig,
    series: HashMap<i64, FulfilledSeries>,
    failing: bool,
    calls: Arc<Mutex<HashMap<i64, usize>>>,
}

impl FakeSeriesServer {
    pub fn new(id: i64, is_4k: bool) -> Self {
        Self {
            config: server_config(id, is_4k),
            series: HashMap::new(),
            failing: false,
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a series from (season number, episode file count) pairs
    pub fn with_series(mut self, external_id: i64, seasons: &[(i32, i64)]) -> Self {
        self.series.insert(
            external_id,
            FulfilledSeries {
                episode_file_count: seasons.iter().map(|(_, count)| count).sum(),
                seasons: seasons
                    .iter()
                    .map(|(season_number, count)| SeasonStatistics {
                        season_number: *season_number,
                        episode_file_count: *count,
                    })
                    .collect(),
            },
        );
        self
    }

    /// Every lookup times out
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls_for(&self, external_id: i64) -> usize {
        self.calls.lock().get(&external_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SeriesFulfillment for FakeSeriesServer {
    fn server(&self) -> &FulfillmentServerConfig {
        &self.config
    }

    async fn series(&self, external_id: i64) -> Result<Option<FulfilledSeries>> {
        *self.calls.lock().entry(external_id).or_insert(0) += 1;
        if self.failing {
            return Err(anyhow!("request timed out"));
        }
        Ok(self.series.get(&external_id).cloned())
    }
}

/// Store keeping records in memory, keyed by id
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<i64, MediaRecord>>>,
    approved: Arc<Mutex<HashSet<(i64, Variant)>>>,
    failing_saves: Arc<Mutex<HashSet<i64>>>,
    failing_loads: Arc<Mutex<bool>>,
    saves: Arc<AtomicUsize>,
    /// (entered, release) pair held by the first page load
    gate: Arc<Mutex<Option<(Arc<Notify>, Arc<Notify>)>>>,
}

impl MemoryStore {
    pub fn with_records(records: impl IntoIterator<Item = MediaRecord>) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .extend(records.into_iter().map(|r| (r.id, r)));
        store
    }

    pub fn approve_request(&self, media_id: i64, variant: Variant) {
        self.approved.lock().insert((media_id, variant));
    }

    pub fn fail_saves_for(&self, media_id: i64) {
        self.failing_saves.lock().insert(media_id);
    }

    pub fn fail_loads(&self) {
        *self.failing_loads.lock() = true;
    }

    /// Make the first page load signal `entered` and wait for `release`
    pub fn gate(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock() = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    pub fn get(&self, id: i64) -> MediaRecord {
        self.records.lock()[&id].clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn load_eligible_page(&self, offset: i64, limit: i64) -> Result<Vec<MediaRecord>> {
        let gate = self.gate.lock().take();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }
        if *self.failing_loads.lock() {
            return Err(anyhow!("database is locked"));
        }
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.is_eligible())
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn save(&self, record: &MediaRecord) -> Result<()> {
        if self.failing_saves.lock().contains(&record.id) {
            return Err(anyhow!("disk I/O error"));
        }
        self.records.lock().insert(record.id, record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn has_approved_unfulfilled_request(
        &self,
        media_id: i64,
        variant: Variant,
    ) -> Result<bool> {
        Ok(self.approved.lock().contains(&(media_id, variant)))
    }
}

pub fn sources(
    media_server: FakeMediaServer,
    movie_servers: Vec<FakeMovieServer>,
    series_servers: Vec<FakeSeriesServer>,
) -> Sources {
    Sources {
        media_server: Arc::new(media_server),
        movie_servers: movie_servers
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn MovieFulfillment>)
            .collect(),
        series_servers: series_servers
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn SeriesFulfillment>)
            .collect(),
    }
}

/// Linkage pointing at server 1 when an external id is given
pub fn link(rating_key: Option<&str>, external_id: Option<i64>) -> Linkage {
    Linkage::Linked(LinkFields {
        server_id: external_id.map(|_| 1),
        external_id,
        slug: external_id.map(|id| format!("title-{}", id)),
        rating_key: rating_key.map(str::to_string),
    })
}

pub fn unlinked() -> Linkage {
    Linkage::default()
}

pub fn movie(
    id: i64,
    standard: (MediaStatus, Linkage),
    enhanced: (MediaStatus, Linkage),
) -> MediaRecord {
    MediaRecord {
        id,
        kind: MediaKind::Movie,
        tmdb_id: Some(id * 1000),
        variants: PerVariant::new(
            VariantState::new(standard.0, standard.1),
            VariantState::new(enhanced.0, enhanced.1),
        ),
        seasons: Vec::new(),
    }
}

/// Seasons given as (season number, standard status, 4K status)
pub fn series(
    id: i64,
    standard: (MediaStatus, Linkage),
    enhanced: (MediaStatus, Linkage),
    seasons: &[(i32, MediaStatus, MediaStatus)],
) -> MediaRecord {
    MediaRecord {
        id,
        kind: MediaKind::Series,
        tmdb_id: Some(id * 1000),
        variants: PerVariant::new(
            VariantState::new(standard.0, standard.1),
            VariantState::new(enhanced.0, enhanced.1),
        ),
        seasons: seasons
            .iter()
            .map(|(number, standard, enhanced)| SeasonRecord {
                id: id * 100 + *number as i64,
                season_number: *number,
                status: PerVariant::new(*standard, *enhanced),
            })
            .collect(),
    }
}
