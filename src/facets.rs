//! Tag facet index.
//!
//! A derived view over the [`VideoStore`]: the global tag vocabulary and each
//! user's channel vocabulary, recomputed on every call. Tag mutation enters
//! here too so that input normalization happens once, before the store's
//! guarded update runs.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::store::VideoStore;

/// Trim a user-supplied tag. Blank tags are rejected.
pub fn normalize_tag(tag: &str) -> Result<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(Error::EmptyTag);
    }
    Ok(tag.to_string())
}

pub struct TagFacetIndex {
    store: Arc<dyn VideoStore>,
}

impl TagFacetIndex {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    /// Every tag on any video, sorted, without blanks.
    pub async fn distinct_tags(&self) -> Result<Vec<String>> {
        let tags: Vec<String> = self
            .store
            .distinct_tags()
            .await?
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect();
        debug!(count = tags.len(), "tag vocabulary");
        Ok(tags)
    }

    /// Channels of the videos owned by the session's user, sorted.
    pub async fn distinct_channels(&self, session: &Session) -> Result<Vec<String>> {
        let channels: Vec<String> = self
            .store
            .distinct_channels(&session.user_id)
            .await?
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
        debug!(user_id = %session.user_id, count = channels.len(), "channel vocabulary");
        Ok(channels)
    }

    /// Tag a video, returning its tags afterwards.
    pub async fn add_tag(&self, session: &Session, video_id: &str, tag: &str) -> Result<Vec<String>> {
        let tag = normalize_tag(tag)?;
        match self.store.add_tag(video_id, &tag).await {
            Ok(tags) => {
                info!(video_id, %tag, user_id = %session.user_id, "tag added");
                Ok(tags)
            }
            Err(e) => {
                if e.is_expected() {
                    warn!(video_id, %tag, error = %e, "tag rejected");
                }
                Err(e)
            }
        }
    }

    /// Remove a tag. Absent tags are not an error; returns whether one was removed.
    pub async fn remove_tag(&self, session: &Session, video_id: &str, tag: &str) -> Result<bool> {
        let tag = normalize_tag(tag)?;
        let removed = self.store.remove_tag(video_id, &tag).await?;
        if removed {
            info!(video_id, %tag, user_id = %session.user_id, "tag removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::NewVideo;
    use crate::store::memory::InMemoryVideoStore;
    use chrono::Utc;

    fn new_video(video_id: &str, channel: &str) -> NewVideo {
        NewVideo {
            video_id: video_id.to_string(),
            title: format!("Title {}", video_id),
            channel: channel.to_string(),
            duration_seconds: 300,
            transcript: Some("text".to_string()),
            processed_at: Utc::now(),
        }
    }

    async fn setup() -> (Arc<InMemoryVideoStore>, TagFacetIndex, Session) {
        let store = Arc::new(InMemoryVideoStore::new());
        store.create(new_video("v1", "Chan A"), "u1").await.unwrap();
        let index = TagFacetIndex::new(store.clone());
        (store, index, Session::new("u1", Utc::now()))
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  python ").unwrap(), "python");
        assert!(matches!(normalize_tag("   "), Err(Error::EmptyTag)));
    }

    #[tokio::test]
    async fn test_duplicate_tag_is_conflict() {
        let (store, index, session) = setup().await;

        index.add_tag(&session, "v1", "python").await.unwrap();
        let err = index.add_tag(&session, "v1", "python").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let video = store.find_by_video_id("v1").await.unwrap().unwrap();
        assert_eq!(video.tags, vec!["python"]);
    }

    #[tokio::test]
    async fn test_fourth_tag_is_limit_exceeded() {
        let (store, index, session) = setup().await;

        for tag in ["a", "b", "c"] {
            index.add_tag(&session, "v1", tag).await.unwrap();
        }
        let err = index.add_tag(&session, "v1", "d").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);

        let video = store.find_by_video_id("v1").await.unwrap().unwrap();
        assert_eq!(video.tags, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_store, index, session) = setup().await;

        index.add_tag(&session, "v1", "rust").await.unwrap();
        assert!(index.remove_tag(&session, "v1", "rust").await.unwrap());
        assert!(!index.remove_tag(&session, "v1", "rust").await.unwrap());
    }

    #[tokio::test]
    async fn test_tag_on_missing_video() {
        let (_store, index, session) = setup().await;
        let err = index.add_tag(&session, "nope", "rust").await.unwrap_err();
        assert!(matches!(err, Error::VideoNotFound(_)));
    }

    #[tokio::test]
    async fn test_vocabularies() {
        let (store, index, session) = setup().await;
        store.create(new_video("v2", "Chan B"), "u2").await.unwrap();
        store.create(new_video("v3", "Chan C"), "u1").await.unwrap();
        store.add_tag("v1", "rust").await.unwrap();
        store.add_tag("v2", "ml").await.unwrap();
        store.add_tag("v3", "rust").await.unwrap();

        // Tags are global; channels are per user.
        assert_eq!(index.distinct_tags().await.unwrap(), vec!["ml", "rust"]);
        assert_eq!(
            index.distinct_channels(&session).await.unwrap(),
            vec!["Chan A", "Chan C"]
        );
        assert!(index
            .distinct_channels(&Session::new("nobody", Utc::now()))
            .await
            .unwrap()
            .is_empty());
    }
}
