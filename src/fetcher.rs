//! Transcript fetcher implementations.
//!
//! - **[`HttpTranscriptFetcher`]**: asks a transcript sidecar service for a
//!   video's metadata and captions.
//! - **[`DisabledFetcher`]**: used when `[fetcher].endpoint` is unset; every
//!   fetch fails.
//!
//! # Wire contract
//!
//! ```text
//! GET {endpoint}/videos/{video_id}?url={submitted url}
//! Authorization: Bearer <token>          (only if api_key_env is set)
//!
//! 200 {"title": "...", "channel": "...", "duration_seconds": 512, "transcript": "..."}
//! 400 → the service could not interpret the URL
//! other non-2xx → fetch failure
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Config, FetcherConfig};
use crate::error::{Error, Result};
use crate::models::FetchedVideo;
use crate::traits::TranscriptFetcher;

/// Fetcher that always fails; stands in when no service is configured.
pub struct DisabledFetcher;

#[async_trait]
impl TranscriptFetcher for DisabledFetcher {
    async fn fetch(&self, _url: &str, _video_id: &str) -> Result<FetchedVideo> {
        Err(Error::Fetch(
            "no transcript service configured; set [fetcher].endpoint".to_string(),
        ))
    }
}

/// HTTP client for the transcript sidecar service.
pub struct HttpTranscriptFetcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_duration_secs: i64,
}

impl HttpTranscriptFetcher {
    pub fn new(config: &FetcherConfig, endpoint: &str, max_duration_secs: i64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                Error::Fetch(format!("{} environment variable not set", var))
            })?),
            None => None,
        };

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            max_duration_secs,
        })
    }
}

#[async_trait]
impl TranscriptFetcher for HttpTranscriptFetcher {
    async fn fetch(&self, url: &str, video_id: &str) -> Result<FetchedVideo> {
        let request_url = format!("{}/videos/{}", self.endpoint, video_id);
        debug!(%request_url, "fetching transcript");

        let mut request = self.client.get(&request_url).query(&[("url", url)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!("transcript service {}: {}", status, body)));
        }

        let fetched: FetchedVideo = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("invalid transcript response: {}", e)))?;

        if fetched.duration_seconds > self.max_duration_secs {
            return Err(Error::DurationExceeded {
                duration: fetched.duration_seconds,
                limit: self.max_duration_secs,
            });
        }

        Ok(fetched)
    }
}

/// Build the fetcher described by `config`.
pub fn create_fetcher(config: &Config) -> Result<Box<dyn TranscriptFetcher>> {
    match &config.fetcher.endpoint {
        Some(endpoint) => Ok(Box::new(HttpTranscriptFetcher::new(
            &config.fetcher,
            endpoint,
            config.ingest.max_duration_secs,
        )?)),
        None => Ok(Box::new(DisabledFetcher)),
    }
}
