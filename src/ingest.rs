//! Ingestion orchestration.
//!
//! Coordinates "is this video already known?" against the transcript fetcher
//! and the store:
//!
//! ```text
//! url ─▶ extract_video_id ─▶ store.find_by_video_id
//!                                │
//!                 found ◀────────┴────────▶ missing
//!                   │                          │
//!            attach_user                fetcher.fetch ─▶ duration ≤ ceiling?
//!          (no fetch at all)                   │
//!                                        store.create
//! ```
//!
//! Creation is all-or-nothing: nothing is written until the fetch has
//! succeeded and passed the duration ceiling.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::models::{NewVideo, Video};
use crate::session::Session;
use crate::store::VideoStore;
use crate::traits::TranscriptFetcher;

/// Extract the YouTube natural key from a submitted URL.
///
/// Accepts `youtube.com/watch?v=ID`, `youtube.com/shorts/ID`,
/// `youtube.com/embed/ID`, `youtube.com/live/ID` and `youtu.be/ID`, on the
/// `www.`, `m.` and `music.` hosts.
pub fn extract_video_id(url: &str) -> Result<String> {
    let invalid = || Error::InvalidUrl(url.to_string());

    let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
    let host = parsed.host_str().ok_or_else(invalid)?;

    let id = match host {
        "www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            let mut segments = parsed.path_segments().ok_or_else(invalid)?;
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string()),
                Some("shorts") | Some("embed") | Some("live") => {
                    segments.next().map(|s| s.to_string())
                }
                _ => None,
            }
        }
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(|id| id.to_string()),
        _ => None,
    };

    match id {
        Some(id) if is_valid_video_id(&id) => Ok(id),
        _ => Err(invalid()),
    }
}

fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// What [`IngestionOrchestrator::ingest`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// First sight of the natural key; the transcript was fetched and stored.
    Created,
    /// Already registered; the requester was added to its owners.
    Shared,
    /// Already registered and already owned by the requester.
    AlreadyOwned,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    pub video: Video,
}

pub struct IngestionOrchestrator {
    store: Arc<dyn VideoStore>,
    fetcher: Arc<dyn TranscriptFetcher>,
    max_duration_secs: i64,
}

impl IngestionOrchestrator {
    pub fn new(
        store: Arc<dyn VideoStore>,
        fetcher: Arc<dyn TranscriptFetcher>,
        max_duration_secs: i64,
    ) -> Self {
        Self {
            store,
            fetcher,
            max_duration_secs,
        }
    }

    /// Register `url` for the session's user.
    pub async fn ingest(&self, session: &Session, url: &str) -> Result<IngestOutcome> {
        let video_id = extract_video_id(url)?;
        let user_id = session.user_id.as_str();

        if let Some(existing) = self.store.find_by_video_id(&video_id).await? {
            return self.share(existing, user_id).await;
        }

        let fetched = self.fetcher.fetch(url, &video_id).await.map_err(|e| {
            if e.is_expected() {
                warn!(%video_id, error = %e, "video rejected");
            } else {
                warn!(%video_id, error = %e, "transcript fetch failed");
            }
            e
        })?;

        if fetched.duration_seconds > self.max_duration_secs {
            warn!(
                %video_id,
                duration = fetched.duration_seconds,
                limit = self.max_duration_secs,
                "video exceeds duration ceiling"
            );
            return Err(Error::DurationExceeded {
                duration: fetched.duration_seconds,
                limit: self.max_duration_secs,
            });
        }

        let new = NewVideo::from_fetched(&video_id, fetched, Utc::now().trunc_subsecs(0));
        match self.store.create(new, user_id).await {
            Ok(video) => {
                info!(%video_id, user_id, "video registered");
                Ok(IngestOutcome {
                    status: IngestStatus::Created,
                    video,
                })
            }
            Err(Error::DuplicateKey(_)) => {
                // Another request registered the same video while we were
                // fetching; join it instead.
                let existing = self
                    .store
                    .find_by_video_id(&video_id)
                    .await?
                    .ok_or_else(|| Error::VideoNotFound(video_id.clone()))?;
                self.share(existing, user_id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn share(&self, existing: Video, user_id: &str) -> Result<IngestOutcome> {
        let added = self.store.attach_user(&existing.video_id, user_id).await?;
        let video = self
            .store
            .find_by_video_id(&existing.video_id)
            .await?
            .unwrap_or(existing);

        if added {
            info!(video_id = %video.video_id, user_id, "video shared with user");
        }
        Ok(IngestOutcome {
            status: if added {
                IngestStatus::Shared
            } else {
                IngestStatus::AlreadyOwned
            },
            video,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchedVideo;
    use crate::store::memory::InMemoryVideoStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeFetcher {
        duration: i64,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(duration: i64) -> Self {
            Self {
                duration,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                duration: 0,
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranscriptFetcher for FakeFetcher {
        async fn fetch(&self, _url: &str, video_id: &str) -> Result<FetchedVideo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Fetch("service unreachable".to_string()));
            }
            Ok(FetchedVideo {
                title: format!("Video {}", video_id),
                channel: "Rust Channel".to_string(),
                duration_seconds: self.duration,
                transcript: "some words".to_string(),
            })
        }
    }

    fn orchestrator(
        store: Arc<InMemoryVideoStore>,
        fetcher: Arc<FakeFetcher>,
    ) -> IngestionOrchestrator {
        IngestionOrchestrator::new(store, fetcher, 1200)
    }

    #[test]
    fn test_extract_video_id_variants() {
        let cases = [
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://youtube.com/watch?v=dQw4w9WgXcQ&t=30s", "dQw4w9WgXcQ"),
            ("https://m.youtube.com/watch?list=PL1&v=abc-DEF_123", "abc-DEF_123"),
            ("https://youtu.be/dQw4w9WgXcQ?t=30", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/shorts/abc123def45", "abc123def45"),
            ("https://www.youtube.com/embed/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("  https://www.youtube.com/live/dQw4w9WgXcQ  ", "dQw4w9WgXcQ"),
        ];
        for (url, expected) in cases {
            assert_eq!(extract_video_id(url).unwrap(), expected, "url: {}", url);
        }
    }

    #[test]
    fn test_extract_video_id_rejects() {
        for url in [
            "",
            "not a url",
            "https://vimeo.com/123456789",
            "https://www.youtube.com/playlist?list=PLrAXtmRdnEQy",
            "https://www.youtube.com/watch",
            "https://youtu.be/",
            "https://www.youtube.com/watch?v=bad%20id",
        ] {
            let err = extract_video_id(url).unwrap_err();
            assert!(matches!(err, Error::InvalidUrl(_)), "url: {}", url);
        }
    }

    #[tokio::test]
    async fn test_first_sight_creates_video() {
        let store = Arc::new(InMemoryVideoStore::new());
        let fetcher = Arc::new(FakeFetcher::new(500));
        let orch = orchestrator(store.clone(), fetcher.clone());

        let out = orch
            .ingest(&Session::new("u1", Utc::now()), "https://youtu.be/v1")
            .await
            .unwrap();
        assert_eq!(out.status, IngestStatus::Created);
        assert_eq!(out.video.user_ids, vec!["u1"]);
        assert!(out.video.tags.is_empty());
        assert_eq!(out.video.transcript.as_deref(), Some("some words"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_known_video_is_shared_without_fetch() {
        let store = Arc::new(InMemoryVideoStore::new());
        let fetcher = Arc::new(FakeFetcher::new(500));
        let orch = orchestrator(store.clone(), fetcher.clone());

        orch.ingest(&Session::new("u1", Utc::now()), "https://youtu.be/v1")
            .await
            .unwrap();
        let out = orch
            .ingest(
                &Session::new("u2", Utc::now()),
                "https://www.youtube.com/watch?v=v1",
            )
            .await
            .unwrap();

        assert_eq!(out.status, IngestStatus::Shared);
        assert_eq!(out.video.user_ids, vec!["u1", "u2"]);
        assert_eq!(store.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let again = orch
            .ingest(&Session::new("u2", Utc::now()), "https://youtu.be/v1")
            .await
            .unwrap();
        assert_eq!(again.status, IngestStatus::AlreadyOwned);
        assert_eq!(again.video.user_ids, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn test_duration_ceiling_blocks_write() {
        let store = Arc::new(InMemoryVideoStore::new());
        let orch = orchestrator(store.clone(), Arc::new(FakeFetcher::new(2000)));

        let err = orch
            .ingest(&Session::new("u1", Utc::now()), "https://youtu.be/long")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DurationExceeded {
                duration: 2000,
                limit: 1200
            }
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let store = Arc::new(InMemoryVideoStore::new());
        let orch = orchestrator(store.clone(), Arc::new(FakeFetcher::failing()));

        let err = orch
            .ingest(&Session::new("u1", Utc::now()), "https://youtu.be/v1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_skips_fetch() {
        let store = Arc::new(InMemoryVideoStore::new());
        let fetcher = Arc::new(FakeFetcher::new(100));
        let orch = orchestrator(store.clone(), fetcher.clone());

        let err = orch
            .ingest(&Session::new("u1", Utc::now()), "https://example.com/x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ceiling_is_configurable() {
        let store = Arc::new(InMemoryVideoStore::new());
        let orch = IngestionOrchestrator::new(store.clone(), Arc::new(FakeFetcher::new(1500)), 1800);
        let out = orch
            .ingest(&Session::new("u1", Utc::now()), "https://youtu.be/v1")
            .await
            .unwrap();
        assert_eq!(out.video.duration_seconds, 1500);
    }
}
