//! HTTP playlist prober
//!
//! Looks a playlist up through a Spotify-style web API:
//! `GET {base_url}/playlists/{id}` answers with the playlist's visibility and
//! track count. A 404 means the playlist is gone. Throttling (429) and
//! server errors are retried with backoff before the probe gives up.

use async_trait::async_trait;
use reqwest::{header::USER_AGENT, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::ProberConfig;
use crate::identity::extract_playlist_id;
use crate::utils::retry::{with_retry_if, RetryConfig};

use super::{ProbeError, ProbeOutcome, ResourceProber};

#[derive(Debug, Deserialize)]
struct PlaylistPayload {
    #[serde(default)]
    public: Option<bool>,
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    total: u32,
}

/// Prober backed by a JSON playlist lookup API
pub struct HttpProber {
    client: Client,
    base_url: String,
    token: Option<String>,
    user_agent: String,
    retry: RetryConfig,
}

impl HttpProber {
    /// Create a prober from configuration
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn new(config: &ProberConfig) -> Result<Self, ProbeError> {
        Self::with_retry(config, RetryConfig::new(config.max_retries))
    }

    /// Create a prober with explicit backoff settings
    pub fn with_retry(config: &ProberConfig, retry: RetryConfig) -> Result<Self, ProbeError> {
        // The health monitor enforces the overall probe timeout; this only
        // bounds a single attempt.
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            user_agent: config.user_agent.clone(),
            retry,
        })
    }

    async fn lookup(&self, url: &str) -> Result<ProbeOutcome, ProbeError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(ProbeOutcome {
                error_message: Some(String::from("playlist not found")),
                ..ProbeOutcome::unreachable()
            });
        }

        if !status.is_success() {
            return Err(ProbeError::UnexpectedStatus(status.as_u16()));
        }

        let payload: PlaylistPayload = response
            .json()
            .await
            .map_err(|e| ProbeError::InvalidResponse(e.to_string()))?;

        Ok(ProbeOutcome {
            is_reachable: true,
            is_public: payload.public.unwrap_or(false),
            occupancy_count: payload.tracks.map(|t| t.total),
            error_message: None,
        })
    }
}

#[async_trait]
impl ResourceProber for HttpProber {
    async fn probe(&self, reference: &str) -> Result<ProbeOutcome, ProbeError> {
        let playlist_id = extract_playlist_id(reference)
            .ok_or_else(|| ProbeError::InvalidReference(reference.to_string()))?;
        let url = format!("{}/playlists/{}", self.base_url, playlist_id);

        tracing::debug!(url = %url, "Probing playlist");

        with_retry_if(&self.retry, || self.lookup(&url), ProbeError::is_recoverable).await
    }
}
