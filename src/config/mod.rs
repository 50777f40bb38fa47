//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default cron expression: every six hours on the hour
const DEFAULT_SYNC_CRON: &str = "0 0 */6 * * *";

/// Connection settings for one Radarr or Sonarr instance
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentServerConfig {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    /// Serves the 4K variant
    #[serde(default, rename = "is4k")]
    pub is_4k: bool,
    #[serde(default = "default_sync_enabled")]
    pub sync_enabled: bool,
}

fn default_sync_enabled() -> bool {
    true
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,

    /// Maximum pooled database connections
    pub database_max_connections: u32,

    /// Plex server URL
    pub plex_url: String,

    /// Plex authentication token
    pub plex_token: String,

    /// Radarr instances
    pub radarr_servers: Vec<FulfillmentServerConfig>,

    /// Sonarr instances
    pub sonarr_servers: Vec<FulfillmentServerConfig>,

    /// Cron expression for the availability sync job
    pub sync_cron: String,

    /// Media records loaded per page
    pub page_size: i64,

    /// Timeout for every remote probe
    pub http_timeout: Duration,

    /// Pretty console logs instead of JSON
    pub pretty_logs: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_path = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "./data/availability.db".to_string());

        Ok(Self {
            database_path,

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),

            plex_url: env::var("PLEX_URL").context("PLEX_URL is required")?,

            plex_token: env::var("PLEX_TOKEN").context("PLEX_TOKEN is required")?,

            radarr_servers: parse_servers(env::var("RADARR_SERVERS").ok().as_deref())
                .context("Invalid RADARR_SERVERS")?,

            sonarr_servers: parse_servers(env::var("SONARR_SERVERS").ok().as_deref())
                .context("Invalid SONARR_SERVERS")?,

            sync_cron: env::var("SYNC_CRON").unwrap_or_else(|_| DEFAULT_SYNC_CRON.to_string()),

            page_size: env::var("SYNC_PAGE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("Invalid SYNC_PAGE_SIZE")?,

            http_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("Invalid HTTP_TIMEOUT_SECS")?,
            ),

            pretty_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("pretty"))
                .unwrap_or(false),
        })
    }
}

/// Parse a JSON array of fulfillment servers. Unset or blank means none.
pub fn parse_servers(raw: Option<&str>) -> Result<Vec<FulfillmentServerConfig>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(json) => serde_json::from_str(json).context("Expected a JSON array of servers"),
    }
}
