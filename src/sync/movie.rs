//! Existence checks for movies
//!
//! Plex is asked first. Only variants it cannot vouch for are looked up in
//! the sync-enabled Radarr instances for that variant, where a movie counts
//! as existing only if Radarr reports a file on disk.

use tracing::debug;

use super::session::SyncSession;
use super::sources::{Probe, Sources};
use super::types::{MediaRecord, PerVariant, Variant};

/// Decide per variant whether the movie still exists anywhere.
///
/// Variants with nothing left to reconcile are not probed and come back `false`.
pub async fn resolve_movie(
    sources: &Sources,
    session: &SyncSession,
    record: &MediaRecord,
) -> PerVariant<bool> {
    let mut exists = PerVariant::new(false, false);
    let tracked: Vec<Variant> = Variant::ALL
        .into_iter()
        .filter(|v| record.tracks(*v))
        .collect();

    for &variant in &tracked {
        let Some(rating_key) = record.rating_key(variant) else {
            continue;
        };
        let lookup = sources.media_server.item(rating_key).await;
        exists[variant] =
            Probe::from_lookup(&lookup, "plex", |item| item.rating_key == rating_key).exists();
    }

    if tracked.iter().all(|v| exists[*v]) {
        debug!(
            session_id = %session.id,
            media_id = record.id,
            "Movie found in Plex for every variant"
        );
        return exists;
    }

    for &variant in &tracked {
        if exists[variant] {
            continue;
        }
        let Some(external_id) = record.external_id(variant) else {
            debug!(
                session_id = %session.id,
                media_id = record.id,
                variant = %variant,
                "No Radarr id, skipping fulfillment lookup"
            );
            continue;
        };

        for server in sources.movie_servers_for(variant) {
            let lookup = server.movie(external_id).await;
            if Probe::from_lookup(&lookup, "radarr", |m| m.has_file).exists() {
                exists[variant] = true;
                break;
            }
            debug!(
                session_id = %session.id,
                media_id = record.id,
                variant = %variant,
                server_id = server.server().id,
                "Movie has no file in Radarr instance"
            );
        }
    }

    debug!(
        session_id = %session.id,
        media_id = record.id,
        standard = exists[Variant::Standard],
        enhanced = exists[Variant::Enhanced],
        "Resolved movie existence"
    );

    exists
}
