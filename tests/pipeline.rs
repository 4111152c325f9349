//! End-to-end tests of the orchestrators over a real SQLite store, with fake
//! collaborators standing in for the transcript service and the LLM.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;

use askontube::error::{Error, ErrorKind, Result};
use askontube::facets::TagFacetIndex;
use askontube::ingest::{IngestStatus, IngestionOrchestrator};
use askontube::migrate;
use askontube::models::FetchedVideo;
use askontube::qa::QaOrchestrator;
use askontube::query::{list_videos, SortOrder, VideoFilter};
use askontube::session::Session;
use askontube::store::sqlite::SqliteVideoStore;
use askontube::store::VideoStore;
use askontube::traits::{AnswerGenerator, TranscriptFetcher};

/// Serves canned videos keyed by video id and counts calls.
struct CatalogFetcher {
    catalog: HashMap<String, FetchedVideo>,
    calls: AtomicUsize,
}

impl CatalogFetcher {
    fn new(entries: &[(&str, &str, i64, &str)]) -> Self {
        let catalog = entries
            .iter()
            .map(|(id, channel, duration, transcript)| {
                (
                    id.to_string(),
                    FetchedVideo {
                        title: format!("Video {}", id),
                        channel: channel.to_string(),
                        duration_seconds: *duration,
                        transcript: transcript.to_string(),
                    },
                )
            })
            .collect();
        Self {
            catalog,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TranscriptFetcher for CatalogFetcher {
    async fn fetch(&self, _url: &str, video_id: &str) -> Result<FetchedVideo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.catalog
            .get(video_id)
            .cloned()
            .ok_or_else(|| Error::Fetch(format!("unknown video {}", video_id)))
    }
}

#[derive(Default)]
struct RecordingGenerator {
    contexts: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl AnswerGenerator for RecordingGenerator {
    async fn generate(&self, question: &str, transcripts: &[String]) -> Result<String> {
        self.contexts.lock().unwrap().push(transcripts.to_vec());
        Ok(format!("answer to '{}'", question))
    }
}

async fn open_pool(tmp: &TempDir) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(tmp.path().join("pipeline.sqlite"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .unwrap();
    migrate::apply(&pool).await.unwrap();
    pool
}

fn session(user: &str) -> Session {
    Session::new(user, Utc::now())
}

#[tokio::test]
async fn test_shared_ingestion_tagging_and_qa() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::new(open_pool(&tmp).await));
    let fetcher = Arc::new(CatalogFetcher::new(&[
        ("v1", "ML Chan", 500, "gradient descent basics"),
        ("v2", "ML Chan", 700, ""),
        ("v3", "Cook Chan", 300, "how to boil eggs"),
    ]));
    let generator = Arc::new(RecordingGenerator::default());

    let ingest = IngestionOrchestrator::new(store.clone(), fetcher.clone(), 1200);
    let facets = TagFacetIndex::new(store.clone());
    let qa = QaOrchestrator::new(store.clone(), generator.clone());

    // u1 registers all three; u2 shares v1 without a second fetch.
    for id in ["v1", "v2", "v3"] {
        let out = ingest
            .ingest(&session("u1"), &format!("https://youtu.be/{}", id))
            .await
            .unwrap();
        assert_eq!(out.status, IngestStatus::Created);
    }
    let shared = ingest
        .ingest(&session("u2"), "https://www.youtube.com/watch?v=v1")
        .await
        .unwrap();
    assert_eq!(shared.status, IngestStatus::Shared);
    assert_eq!(shared.video.user_ids, vec!["u1", "u2"]);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);

    // Blank transcripts are stored as absent.
    let v2 = store.find_by_video_id("v2").await.unwrap().unwrap();
    assert_eq!(v2.transcript, None);

    facets.add_tag(&session("u1"), "v1", "ml").await.unwrap();
    facets.add_tag(&session("u1"), "v2", "ml").await.unwrap();
    facets.add_tag(&session("u2"), "v3", "food").await.unwrap();
    assert_eq!(facets.distinct_tags().await.unwrap(), vec!["food", "ml"]);
    assert_eq!(
        facets.distinct_channels(&session("u2")).await.unwrap(),
        vec!["ML Chan"]
    );

    // Only v1 contributes: v2 has no transcript.
    let answer = qa
        .ask_by_tags(&session("u1"), &["ml".to_string()], "What is gradient descent?")
        .await
        .unwrap();
    assert_eq!(answer.video_ids, vec!["v1"]);
    assert_eq!(answer.answer, "answer to 'What is gradient descent?'");
    assert_eq!(
        generator.contexts.lock().unwrap().last().unwrap(),
        &vec!["gradient descent basics".to_string()]
    );

    // u2's library holds v1 only.
    let videos = list_videos(store.as_ref(), &session("u2"), &VideoFilter::default(), SortOrder::Newest)
        .await
        .unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].video_id, "v1");
}

#[tokio::test]
async fn test_duration_ceiling_over_sqlite() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::new(open_pool(&tmp).await));
    let fetcher = Arc::new(CatalogFetcher::new(&[("long1", "C", 2000, "text")]));
    let ingest = IngestionOrchestrator::new(store.clone(), fetcher, 1200);

    let err = ingest
        .ingest(&session("u1"), "https://youtu.be/long1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    assert!(store.find_by_video_id("long1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_first_sight_creates_one_record() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::new(open_pool(&tmp).await));
    let fetcher = Arc::new(CatalogFetcher::new(&[("hot1", "C", 100, "text")]));
    let ingest = Arc::new(IngestionOrchestrator::new(store.clone(), fetcher, 1200));

    let mut handles = Vec::new();
    for user in ["u1", "u2", "u3", "u4"] {
        let ingest = ingest.clone();
        handles.push(tokio::spawn(async move {
            ingest
                .ingest(&session(user), "https://youtu.be/hot1")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let video = store.find_by_video_id("hot1").await.unwrap().unwrap();
    let mut owners = video.user_ids.clone();
    owners.sort();
    assert_eq!(owners, vec!["u1", "u2", "u3", "u4"]);

    let for_u3 = store.videos_for_user("u3").await.unwrap();
    assert_eq!(for_u3.len(), 1);
}

#[tokio::test]
async fn test_concurrent_tagging_respects_limit() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::new(open_pool(&tmp).await));
    let fetcher = Arc::new(CatalogFetcher::new(&[("v1", "C", 100, "text")]));
    IngestionOrchestrator::new(store.clone(), fetcher, 1200)
        .ingest(&session("u1"), "https://youtu.be/v1")
        .await
        .unwrap();

    let facets = Arc::new(TagFacetIndex::new(store.clone()));
    let mut handles = Vec::new();
    for tag in ["a", "b", "c", "d", "e", "f"] {
        let facets = facets.clone();
        handles.push(tokio::spawn(async move {
            facets.add_tag(&session("u1"), "v1", tag).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::LimitExceeded, "unexpected: {}", e),
        }
    }
    assert_eq!(ok, 3);

    let video = store.find_by_video_id("v1").await.unwrap().unwrap();
    assert_eq!(video.tags.len(), 3);
}
