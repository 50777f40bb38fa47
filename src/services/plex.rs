//! Plex media server client
//!
//! Only the two metadata endpoints the availability sync needs:
//! `/library/metadata/{ratingKey}` and its `/children` (seasons of a show).

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::rate_limiter::RateLimitedClient;
use crate::sync::sources::{MediaServer, MediaServerChild, MediaServerItem};

#[derive(Debug, Deserialize)]
struct PlexResponse {
    #[serde(rename = "MediaContainer")]
    media_container: PlexMediaContainer,
}

#[derive(Debug, Default, Deserialize)]
struct PlexMediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlexMetadata {
    rating_key: Option<String>,
    index: Option<i32>,
}

/// Plex API client
pub struct PlexClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    token: String,
}

impl PlexClient {
    pub fn new(client: Arc<RateLimitedClient>, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    async fn metadata(&self, path: &str) -> Result<Option<Vec<PlexMetadata>>> {
        let url = format!("{}{}", self.base_url, path);
        let response: Option<PlexResponse> = self
            .client
            .get_json_optional(&url, &[("X-Plex-Token", self.token.as_str())])
            .await
            .with_context(|| format!("Plex request for {} failed", path))?;

        Ok(response.map(|r| r.media_container.metadata))
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn item(&self, rating_key: &str) -> Result<Option<MediaServerItem>> {
        let metadata = self
            .metadata(&format!("/library/metadata/{}", rating_key))
            .await?;

        Ok(metadata
            .and_then(|items| items.into_iter().next())
            .map(|item| MediaServerItem {
                rating_key: item.rating_key.unwrap_or_else(|| rating_key.to_string()),
            }))
    }

    async fn children(&self, rating_key: &str) -> Result<Option<Vec<MediaServerChild>>> {
        let metadata = self
            .metadata(&format!("/library/metadata/{}/children", rating_key))
            .await?;

        Ok(metadata.map(|items| {
            items
                .into_iter()
                .map(|child| MediaServerChild { index: child.index })
                .collect()
        }))
    }
}
