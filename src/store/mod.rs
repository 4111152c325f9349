//! Storage abstraction for the video registry.
//!
//! The [`VideoStore`] trait owns the registry invariants: one record per
//! natural key, monotonically growing ownership, and at most
//! [`MAX_TAGS`](crate::models::MAX_TAGS) unique tags per video.
//!
//! Every mutation is a single-record conditional update. Backends must never
//! implement `attach_user`, `add_tag` or `remove_tag` as an unguarded
//! read-then-write, because a video is shared by all of its submitters and
//! two of them may edit it at the same moment.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`sqlite::SqliteVideoStore`] | Persistent store used by the CLI and server |
//! | [`memory::InMemoryVideoStore`] | Tests and embedders without a database |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewVideo, Video};

/// Persistent collection of [`Video`] records keyed by natural video id.
///
/// List-returning methods yield videos in insertion order, which callers rely
/// on as the tie-breaker for stable sorting.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Look up a video by its natural key. No side effects.
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<Video>>;

    /// Register a video owned by `owner`.
    ///
    /// Fails with [`Error::DuplicateKey`](crate::error::Error::DuplicateKey)
    /// if the natural key is already present.
    async fn create(&self, new: NewVideo, owner: &str) -> Result<Video>;

    /// Add `user_id` to the video's owners. Returns `false` if already present.
    async fn attach_user(&self, video_id: &str, user_id: &str) -> Result<bool>;

    /// Append `tag`, returning the new tag list.
    ///
    /// Fails with `TagLimitExceeded` when the video already carries the
    /// maximum number of tags, or `TagAlreadyExists` when `tag` is present.
    /// The limit is checked first. On failure the record is unchanged.
    async fn add_tag(&self, video_id: &str, tag: &str) -> Result<Vec<String>>;

    /// Remove `tag` if present. Returns whether anything was removed.
    async fn remove_tag(&self, video_id: &str, tag: &str) -> Result<bool>;

    /// All videos whose owners include `user_id`.
    async fn videos_for_user(&self, user_id: &str) -> Result<Vec<Video>>;

    /// All videos carrying at least one of `tags`, across every user.
    async fn videos_with_any_tag(&self, tags: &[String]) -> Result<Vec<Video>>;

    /// Distinct tags over every video, sorted.
    async fn distinct_tags(&self) -> Result<Vec<String>>;

    /// Distinct channels over the videos owned by `user_id`, sorted.
    async fn distinct_channels(&self, user_id: &str) -> Result<Vec<String>>;
}
