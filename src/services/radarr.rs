//! Radarr movie fulfillment client

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::rate_limiter::RateLimitedClient;
use crate::config::FulfillmentServerConfig;
use crate::sync::sources::{FulfilledMovie, MovieFulfillment};

/// Movie as returned by `GET /api/v3/movie/{id}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarrMovie {
    #[serde(default)]
    pub has_file: bool,
}

/// Client for one Radarr instance
pub struct RadarrClient {
    client: Arc<RateLimitedClient>,
    server: FulfillmentServerConfig,
}

impl RadarrClient {
    pub fn new(client: Arc<RateLimitedClient>, server: FulfillmentServerConfig) -> Self {
        Self { client, server }
    }

    pub async fn get_movie(&self, id: i64) -> Result<Option<RadarrMovie>> {
        let url = format!(
            "{}/api/v3/movie/{}",
            self.server.base_url.trim_end_matches('/'),
            id
        );

        self.client
            .get_json_optional(&url, &[("X-Api-Key", self.server.api_key.as_str())])
            .await
            .with_context(|| format!("Radarr '{}' movie lookup failed", self.server.name))
    }
}

#[async_trait]
impl MovieFulfillment for RadarrClient {
    fn server(&self) -> &FulfillmentServerConfig {
        &self.server
    }

    async fn movie(&self, external_id: i64) -> Result<Option<FulfilledMovie>> {
        Ok(self.get_movie(external_id).await?.map(|movie| FulfilledMovie {
            has_file: movie.has_file,
        }))
    }
}
