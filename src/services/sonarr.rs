//! Sonarr series fulfillment client

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::rate_limiter::RateLimitedClient;
use crate::config::FulfillmentServerConfig;
use crate::sync::sources::{FulfilledSeries, SeasonStatistics, SeriesFulfillment};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrStatistics {
    #[serde(default)]
    pub episode_file_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrSeason {
    pub season_number: i32,
    #[serde(default)]
    pub statistics: Option<SonarrStatistics>,
}

/// Series as returned by `GET /api/v3/series/{id}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrSeries {
    #[serde(default)]
    pub statistics: Option<SonarrStatistics>,
    #[serde(default)]
    pub seasons: Vec<SonarrSeason>,
}

impl From<SonarrSeries> for FulfilledSeries {
    fn from(series: SonarrSeries) -> Self {
        Self {
            episode_file_count: series.statistics.unwrap_or_default().episode_file_count,
            seasons: series
                .seasons
                .into_iter()
                .map(|season| SeasonStatistics {
                    season_number: season.season_number,
                    episode_file_count: season.statistics.unwrap_or_default().episode_file_count,
                })
                .collect(),
        }
    }
}

/// Client for one Sonarr instance
pub struct SonarrClient {
    client: Arc<RateLimitedClient>,
    server: FulfillmentServerConfig,
}

impl SonarrClient {
    pub fn new(client: Arc<RateLimitedClient>, server: FulfillmentServerConfig) -> Self {
        Self { client, server }
    }

    pub async fn get_series(&self, id: i64) -> Result<Option<SonarrSeries>> {
        let url = format!(
            "{}/api/v3/series/{}",
            self.server.base_url.trim_end_matches('/'),
            id
        );

        self.client
            .get_json_optional(&url, &[("X-Api-Key", self.server.api_key.as_str())])
            .await
            .with_context(|| format!("Sonarr '{}' series lookup failed", self.server.name))
    }
}

#[async_trait]
impl SeriesFulfillment for SonarrClient {
    fn server(&self) -> &FulfillmentServerConfig {
        &self.server
    }

    async fn series(&self, external_id: i64) -> Result<Option<FulfilledSeries>> {
        Ok(self.get_series(external_id).await?.map(FulfilledSeries::from))
    }
}
