//! Rate-limited HTTP client shared by the remote probes
//!
//! Every probe goes through a governor quota so a full sync pass cannot flood
//! Plex or the *arr instances. Requests are never retried; a failure is
//! reported once and the caller decides what it means.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per second
    pub requests_per_second: u32,
    /// Burst capacity (allows short bursts above the rate)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            burst_size: 10,
        }
    }
}

/// A rate-limited HTTP client wrapper
pub struct RateLimitedClient {
    client: Client,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    name: String,
}

impl RateLimitedClient {
    /// Create a new rate-limited client
    pub fn new(name: &str, config: RateLimitConfig, timeout: Duration) -> Result<Self> {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::direct(quota)),
            name: name.to_string(),
        })
    }

    /// Client for the Plex server, which is local and tolerates a higher rate
    pub fn for_plex(timeout: Duration) -> Result<Self> {
        Self::new(
            "plex",
            RateLimitConfig {
                requests_per_second: 10,
                burst_size: 20,
            },
            timeout,
        )
    }

    /// Client for one Radarr or Sonarr instance
    pub fn for_arr(name: &str, timeout: Duration) -> Result<Self> {
        Self::new(name, RateLimitConfig::default(), timeout)
    }

    /// Wait for rate limit and make a GET request with headers
    pub async fn get_with_headers(&self, url: &str, headers: &[(&str, &str)]) -> Result<Response> {
        self.wait_for_permit().await;
        debug!(client = %self.name, url = %url, "Making rate-limited GET request");

        let mut request = self.client.get(url).header("Accept", "application/json");
        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        request.send().await.context("HTTP request failed")
    }

    /// GET and decode a JSON body. A 404 is `Ok(None)`; any other failure is an error.
    pub async fn get_json_optional<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let response = self.get_with_headers(url, headers).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(client = %self.name, url = %url, "Resource not found");
            return Ok(None);
        }

        if !response.status().is_success() {
            anyhow::bail!("{} request failed with status: {}", self.name, response.status());
        }

        let body = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.name))?;

        Ok(Some(body))
    }

    /// Wait for a rate limit permit
    pub async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}
