//! Existence checks for series and their seasons
//!
//! Series level works like movies: Plex first, then every sync-enabled
//! Sonarr instance for the variant, where a series exists if it has at least
//! one episode file. Sonarr answers also carry per-season statistics, which
//! are cached in the session and reused by the season checks.
//!
//! A season exists if Plex lists it as a child of the series, or if Sonarr
//! statistics show an episode file for it. When the series itself is lost for
//! a variant, the season checks skip Sonarr for that variant but still ask
//! Plex, which answers for its own library.

use std::collections::BTreeMap;

use tracing::debug;

use super::cache::LookupCache;
use super::session::SyncSession;
use super::sources::{FulfilledSeries, MediaServer, Probe, SeriesFulfillment, Sources};
use super::types::{MediaRecord, PerVariant, Variant};

/// Existence facts for a series
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesExistence {
    pub series: PerVariant<bool>,
    /// season number -> exists, for present seasons of every tracked variant
    pub seasons: PerVariant<BTreeMap<i32, bool>>,
}

impl SeriesExistence {
    pub fn any(&self) -> bool {
        self.series.iter().any(|(_, exists)| *exists)
    }
}

pub async fn resolve_series(
    sources: &Sources,
    session: &mut SyncSession,
    record: &MediaRecord,
) -> SeriesExistence {
    let mut result = SeriesExistence::default();
    let tracked: Vec<Variant> = Variant::ALL
        .into_iter()
        .filter(|v| record.tracks(*v))
        .collect();

    let mut in_plex = PerVariant::new(false, false);
    for &variant in &tracked {
        if let Some(rating_key) = record.rating_key(variant) {
            let lookup = sources.media_server.item(rating_key).await;
            in_plex[variant] =
                Probe::from_lookup(&lookup, "plex", |item| item.rating_key == rating_key).exists();
        }
    }
    let short_circuit = tracked.iter().all(|v| in_plex[*v]);

    for &variant in &tracked {
        let mut in_sonarr = false;
        if !short_circuit && !in_plex[variant] {
            if let Some(external_id) = record.external_id(variant) {
                in_sonarr =
                    series_has_files(sources, &mut session.cache, variant, external_id).await;
            }
        }
        result.series[variant] = in_plex[variant] || in_sonarr;
    }

    for &variant in &tracked {
        let present: Vec<i32> = record
            .seasons
            .iter()
            .filter(|s| s.status[variant].is_present())
            .map(|s| s.season_number)
            .collect();
        if present.is_empty() {
            continue;
        }

        let listed = match record.rating_key(variant) {
            Some(rating_key) => {
                plex_season_numbers(sources.media_server.as_ref(), &mut session.cache, rating_key)
                    .await
            }
            None => Vec::new(),
        };

        // Sonarr already had nothing for a lost series, only Plex can keep its seasons
        let ask_sonarr = result.series[variant];
        for season_number in present {
            let mut exists = listed.contains(&season_number);
            if !exists && ask_sonarr {
                if let Some(external_id) = record.external_id(variant) {
                    exists = season_has_files(
                        sources,
                        &mut session.cache,
                        variant,
                        external_id,
                        season_number,
                    )
                    .await;
                }
            }
            result.seasons[variant].insert(season_number, exists);
        }
    }

    debug!(
        session_id = %session.id,
        media_id = record.id,
        standard = result.series[Variant::Standard],
        enhanced = result.series[Variant::Enhanced],
        missing_seasons = result
            .seasons
            .iter()
            .map(|(_, seasons)| seasons.values().filter(|e| !**e).count())
            .sum::<usize>(),
        "Resolved series existence"
    );

    result
}

async fn fetch_series(server: &dyn SeriesFulfillment, external_id: i64) -> Option<FulfilledSeries> {
    match server.series(external_id).await {
        Ok(series) => series,
        Err(e) => {
            debug!(
                server_id = server.server().id,
                external_id = external_id,
                error = %e,
                "Sonarr lookup failed, treating as absent"
            );
            None
        }
    }
}

async fn series_has_files(
    sources: &Sources,
    cache: &mut LookupCache,
    variant: Variant,
    external_id: i64,
) -> bool {
    for server in sources.series_servers_for(variant) {
        let found = cache
            .series(server.server().id, external_id, || {
                fetch_series(server.as_ref(), external_id)
            })
            .await
            .is_some_and(|series| series.episode_file_count > 0);
        if found {
            return true;
        }
    }
    false
}

async fn season_has_files(
    sources: &Sources,
    cache: &mut LookupCache,
    variant: Variant,
    external_id: i64,
    season_number: i32,
) -> bool {
    for server in sources.series_servers_for(variant) {
        let found = cache
            .series(server.server().id, external_id, || {
                fetch_series(server.as_ref(), external_id)
            })
            .await
            .is_some_and(|series| series.season_has_files(season_number));
        if found {
            return true;
        }
    }
    false
}

async fn plex_season_numbers(
    media_server: &dyn MediaServer,
    cache: &mut LookupCache,
    rating_key: &str,
) -> Vec<i32> {
    cache
        .children(rating_key, || async move {
            match media_server.children(rating_key).await {
                Ok(children) => children,
                Err(e) => {
                    debug!(rating_key = rating_key, error = %e, "Plex children lookup failed");
                    None
                }
            }
        })
        .await
        .iter()
        .filter_map(|child| child.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::*;
    use crate::sync::types::MediaStatus;
    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    fn session() -> SyncSession {
        SyncSession::new(CancellationToken::new())
    }

    fn three_seasons() -> MediaRecord {
        series(
            7,
            (MediaStatus::Available, link(Some("s1"), Some(70))),
            (MediaStatus::Unknown, unlinked()),
            &[
                (1, MediaStatus::Available, MediaStatus::Unknown),
                (2, MediaStatus::Available, MediaStatus::Unknown),
                (3, MediaStatus::Available, MediaStatus::Unknown),
            ],
        )
    }

    #[tokio::test]
    async fn test_sonarr_statistics_fetched_once_for_all_seasons() {
        let plex = FakeMediaServer::new();
        let sonarr = FakeSeriesServer::new(1, false).with_series(70, &[(1, 5), (2, 0), (3, 8)]);
        let sources = sources(plex, vec![], vec![sonarr.clone()]);
        let mut session = session();

        let existence = resolve_series(&sources, &mut session, &three_seasons()).await;

        assert!(existence.series[Variant::Standard]);
        assert_eq!(
            existence.seasons[Variant::Standard],
            BTreeMap::from([(1, true), (2, false), (3, true)])
        );
        assert_eq!(sonarr.calls_for(70), 1);
    }

    #[tokio::test]
    async fn test_plex_children_fetched_once_per_rating_key() {
        let plex = FakeMediaServer::new()
            .with_items(&["s1"])
            .with_children("s1", &[1, 3]);
        let sonarr = FakeSeriesServer::new(1, false).with_series(70, &[(1, 5), (2, 0), (3, 8)]);
        let sources = sources(plex.clone(), vec![], vec![sonarr.clone()]);
        let mut session = session();

        let existence = resolve_series(&sources, &mut session, &three_seasons()).await;

        assert_eq!(
            existence.seasons[Variant::Standard],
            BTreeMap::from([(1, true), (2, false), (3, true)])
        );
        assert_eq!(plex.children_calls("s1"), 1);
        // Short-circuited at series level, season 2 still consulted Sonarr lazily
        assert_eq!(sonarr.calls_for(70), 1);
    }

    #[tokio::test]
    async fn test_lost_series_seasons_still_checked_in_plex() {
        let plex = FakeMediaServer::new().with_children("s1", &[1, 2]);
        let sonarr = FakeSeriesServer::new(1, false).with_series(70, &[(1, 0), (2, 0), (3, 0)]);
        let sources = sources(plex.clone(), vec![], vec![sonarr.clone()]);
        let mut session = session();

        let existence = resolve_series(&sources, &mut session, &three_seasons()).await;

        // No Plex item and no Sonarr files, but Plex still lists two seasons
        assert!(!existence.series[Variant::Standard]);
        assert_eq!(
            existence.seasons[Variant::Standard],
            BTreeMap::from([(1, true), (2, true), (3, false)])
        );
        assert_eq!(plex.children_calls("s1"), 1);
        assert_eq!(sonarr.calls_for(70), 1);
    }

    #[tokio::test]
    async fn test_sonarr_failure_counts_as_absent() {
        let sonarr = FakeSeriesServer::new(1, false).failing();
        let sources = sources(FakeMediaServer::new(), vec![], vec![sonarr.clone()]);
        let mut session = session();

        let existence = resolve_series(&sources, &mut session, &three_seasons()).await;

        assert!(!existence.series[Variant::Standard]);
        assert!(!existence.any());
        assert_eq!(
            existence.seasons[Variant::Standard],
            BTreeMap::from([(1, false), (2, false), (3, false)])
        );
        assert_eq!(sonarr.calls_for(70), 1);
    }

    #[tokio::test]
    async fn test_failed_sonarr_lookup_not_repeated_per_season() {
        // Series found in Plex without children, so every season falls back to Sonarr
        let plex = FakeMediaServer::new().with_items(&["s1"]);
        let sonarr = FakeSeriesServer::new(1, false).failing();
        let sources = sources(plex, vec![], vec![sonarr.clone()]);
        let mut session = session();

        let existence = resolve_series(&sources, &mut session, &three_seasons()).await;

        assert!(existence.series[Variant::Standard]);
        assert_eq!(
            existence.seasons[Variant::Standard],
            BTreeMap::from([(1, false), (2, false), (3, false)])
        );
        assert_eq!(sonarr.calls_for(70), 1);
    }

    #[tokio::test]
    async fn test_plex_keeps_seasons_when_sonarr_empty() {
        // 4K series is missing from Plex, standard is present, so no short circuit
        let plex = FakeMediaServer::new()
            .with_items(&["s1"])
            .with_children("s1", &[1, 2]);
        let sonarr = FakeSeriesServer::new(1, false).with_series(70, &[(1, 0), (2, 0), (3, 0)]);
        let sonarr_4k = FakeSeriesServer::new(2, true).with_series(71, &[(1, 0)]);
        let sources = sources(plex.clone(), vec![], vec![sonarr.clone(), sonarr_4k.clone()]);
        let record = series(
            7,
            (MediaStatus::Available, link(Some("s1"), Some(70))),
            (MediaStatus::Available, link(Some("s4k"), Some(71))),
            &[
                (1, MediaStatus::Available, MediaStatus::Available),
                (2, MediaStatus::Available, MediaStatus::Unknown),
                (3, MediaStatus::Available, MediaStatus::Unknown),
            ],
        );
        let mut session = session();

        let existence = resolve_series(&sources, &mut session, &record).await;

        assert!(existence.series[Variant::Standard]);
        assert!(!existence.series[Variant::Enhanced]);
        assert_eq!(
            existence.seasons[Variant::Standard],
            BTreeMap::from([(1, true), (2, true), (3, false)])
        );
        // The lost 4K series has no Plex children, so its season goes too
        assert_eq!(
            existence.seasons[Variant::Enhanced],
            BTreeMap::from([(1, false)])
        );
        assert_eq!(plex.children_calls("s4k"), 1);
        assert_eq!(sonarr_4k.calls_for(71), 1);
        // Standard series found in Plex; season 3 falls back to Sonarr once
        assert_eq!(sonarr.calls_for(70), 1);
    }

    #[tokio::test]
    async fn test_only_present_seasons_are_judged() {
        let plex = FakeMediaServer::new()
            .with_items(&["s1"])
            .with_children("s1", &[1]);
        let sources = sources(plex, vec![], vec![]);
        let record = series(
            7,
            (MediaStatus::PartiallyAvailable, link(Some("s1"), None)),
            (MediaStatus::Unknown, unlinked()),
            &[
                (1, MediaStatus::Available, MediaStatus::Unknown),
                (2, MediaStatus::Deleted, MediaStatus::Unknown),
                (3, MediaStatus::Pending, MediaStatus::Unknown),
            ],
        );
        let mut session = session();

        let existence = resolve_series(&sources, &mut session, &record).await;

        assert_eq!(
            existence.seasons[Variant::Standard],
            BTreeMap::from([(1, true)])
        );
        assert!(existence.any());
    }
}
