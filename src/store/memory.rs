//! In-memory [`VideoStore`] implementation for tests and embedders.
//!
//! Records live in a `Vec` behind a `std::sync::RwLock`; insertion order is
//! the vector order. Each mutation runs its guard and its write under one
//! write-lock acquisition, which gives the same atomicity as the SQLite
//! backend's conditional updates.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewVideo, Video, MAX_TAGS};

use super::VideoStore;

/// In-memory video store.
pub struct InMemoryVideoStore {
    videos: RwLock<Vec<Video>>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self {
            videos: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored videos.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Video>> {
        self.videos.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Video>> {
        self.videos.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryVideoStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<Video>> {
        Ok(self.read().iter().find(|v| v.video_id == video_id).cloned())
    }

    async fn create(&self, new: NewVideo, owner: &str) -> Result<Video> {
        let mut videos = self.write();
        if videos.iter().any(|v| v.video_id == new.video_id) {
            return Err(Error::DuplicateKey(new.video_id));
        }
        let video = Video {
            id: Uuid::new_v4().to_string(),
            video_id: new.video_id,
            title: new.title,
            channel: new.channel,
            duration_seconds: new.duration_seconds,
            transcript: new.transcript,
            tags: Vec::new(),
            user_ids: vec![owner.to_string()],
            processed_at: new.processed_at,
        };
        videos.push(video.clone());
        Ok(video)
    }

    async fn attach_user(&self, video_id: &str, user_id: &str) -> Result<bool> {
        let mut videos = self.write();
        let video = videos
            .iter_mut()
            .find(|v| v.video_id == video_id)
            .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;
        if video.is_owned_by(user_id) {
            return Ok(false);
        }
        video.user_ids.push(user_id.to_string());
        Ok(true)
    }

    async fn add_tag(&self, video_id: &str, tag: &str) -> Result<Vec<String>> {
        let mut videos = self.write();
        let video = videos
            .iter_mut()
            .find(|v| v.video_id == video_id)
            .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;
        if video.tags.len() >= MAX_TAGS {
            return Err(Error::TagLimitExceeded { limit: MAX_TAGS });
        }
        if video.has_tag(tag) {
            return Err(Error::TagAlreadyExists(tag.to_string()));
        }
        video.tags.push(tag.to_string());
        Ok(video.tags.clone())
    }

    async fn remove_tag(&self, video_id: &str, tag: &str) -> Result<bool> {
        let mut videos = self.write();
        let video = videos
            .iter_mut()
            .find(|v| v.video_id == video_id)
            .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;
        let before = video.tags.len();
        video.tags.retain(|t| t != tag);
        Ok(video.tags.len() != before)
    }

    async fn videos_for_user(&self, user_id: &str) -> Result<Vec<Video>> {
        Ok(self
            .read()
            .iter()
            .filter(|v| v.is_owned_by(user_id))
            .cloned()
            .collect())
    }

    async fn videos_with_any_tag(&self, tags: &[String]) -> Result<Vec<Video>> {
        Ok(self
            .read()
            .iter()
            .filter(|v| tags.iter().any(|t| v.has_tag(t)))
            .cloned()
            .collect())
    }

    async fn distinct_tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self
            .read()
            .iter()
            .flat_map(|v| v.tags.iter().cloned())
            .collect();
        Ok(tags.into_iter().collect())
    }

    async fn distinct_channels(&self, user_id: &str) -> Result<Vec<String>> {
        let channels: BTreeSet<String> = self
            .read()
            .iter()
            .filter(|v| v.is_owned_by(user_id))
            .map(|v| v.channel.clone())
            .collect();
        Ok(channels.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn new_video(video_id: &str) -> NewVideo {
        NewVideo {
            video_id: video_id.to_string(),
            title: format!("Title {}", video_id),
            channel: "chan".to_string(),
            duration_seconds: 500,
            transcript: Some("hello".to_string()),
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_key() {
        let store = InMemoryVideoStore::new();
        store.create(new_video("v1"), "u1").await.unwrap();
        let err = store.create(new_video("v1"), "u2").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(ref k) if k == "v1"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_attach_user_is_idempotent() {
        let store = InMemoryVideoStore::new();
        store.create(new_video("v1"), "u1").await.unwrap();
        assert!(store.attach_user("v1", "u2").await.unwrap());
        assert!(!store.attach_user("v1", "u2").await.unwrap());
        assert!(!store.attach_user("v1", "u1").await.unwrap());
        let v = store.find_by_video_id("v1").await.unwrap().unwrap();
        assert_eq!(v.user_ids, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn test_attach_user_missing_video() {
        let store = InMemoryVideoStore::new();
        let err = store.attach_user("nope", "u1").await.unwrap_err();
        assert!(matches!(err, Error::VideoNotFound(_)));
    }

    #[tokio::test]
    async fn test_limit_checked_before_duplicate() {
        let store = InMemoryVideoStore::new();
        store.create(new_video("v1"), "u1").await.unwrap();
        for t in ["a", "b", "c"] {
            store.add_tag("v1", t).await.unwrap();
        }
        let err = store.add_tag("v1", "a").await.unwrap_err();
        assert!(matches!(err, Error::TagLimitExceeded { limit: 3 }));
    }

    #[tokio::test]
    async fn test_concurrent_tag_adds_never_exceed_limit() {
        let store = Arc::new(InMemoryVideoStore::new());
        store.create(new_video("v1"), "u1").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add_tag("v1", &format!("t{}", i)).await
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 3);
        let v = store.find_by_video_id("v1").await.unwrap().unwrap();
        assert_eq!(v.tags.len(), 3);
    }
}
