//! External service integrations

pub mod plex;
pub mod radarr;
pub mod rate_limiter;
pub mod sonarr;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use plex::PlexClient;
use radarr::RadarrClient;
use rate_limiter::RateLimitedClient;
use sonarr::SonarrClient;

use crate::config::Config;
use crate::sync::sources::{MovieFulfillment, SeriesFulfillment, Sources};

/// Build the Plex, Radarr and Sonarr clients described by the configuration.
///
/// Each *arr instance gets its own rate limiter.
pub fn build_sources(config: &Config) -> Result<Sources> {
    let plex_http = Arc::new(RateLimitedClient::for_plex(config.http_timeout)?);
    let media_server = Arc::new(PlexClient::new(plex_http, &config.plex_url, &config.plex_token));

    let mut movie_servers: Vec<Arc<dyn MovieFulfillment>> = Vec::new();
    for server in &config.radarr_servers {
        let http = RateLimitedClient::for_arr(&format!("radarr-{}", server.id), config.http_timeout)?;
        movie_servers.push(Arc::new(RadarrClient::new(Arc::new(http), server.clone())));
    }

    let mut series_servers: Vec<Arc<dyn SeriesFulfillment>> = Vec::new();
    for server in &config.sonarr_servers {
        let http = RateLimitedClient::for_arr(&format!("sonarr-{}", server.id), config.http_timeout)?;
        series_servers.push(Arc::new(SonarrClient::new(Arc::new(http), server.clone())));
    }

    info!(
        radarr = movie_servers.len(),
        sonarr = series_servers.len(),
        "Configured fulfillment servers"
    );

    Ok(Sources {
        media_server,
        movie_servers,
        series_servers,
    })
}
