//! Core data models used throughout AskOnTube.
//!
//! These types represent the users, videos and feedback records that flow
//! between the store, the orchestrators and the outer surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of tags a single video may carry.
pub const MAX_TAGS: usize = 3;

/// Verified identity returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identity {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

/// Registered user. Created on first successful login.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful transcript/metadata fetch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchedVideo {
    pub title: String,
    pub channel: String,
    pub duration_seconds: i64,
    #[serde(default)]
    pub transcript: String,
}

/// Attributes of a video about to be registered for the first time.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub duration_seconds: i64,
    pub transcript: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl NewVideo {
    pub fn from_fetched(video_id: &str, fetched: FetchedVideo, processed_at: DateTime<Utc>) -> Self {
        let transcript = if fetched.transcript.trim().is_empty() {
            None
        } else {
            Some(fetched.transcript)
        };
        Self {
            video_id: video_id.to_string(),
            title: fetched.title,
            channel: fetched.channel,
            duration_seconds: fetched.duration_seconds,
            transcript,
            processed_at,
        }
    }
}

/// A processed video, shared by every user who submitted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Video {
    /// Surrogate UUID.
    pub id: String,
    /// Natural key from the source platform.
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub duration_seconds: i64,
    pub transcript: Option<String>,
    /// Ordered, unique, at most [`MAX_TAGS`] entries.
    pub tags: Vec<String>,
    /// Submitters in attachment order; no duplicates.
    pub user_ids: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

impl Video {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|u| u == user_id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Transcript text, if one was stored and it is not blank.
    pub fn transcript_text(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Append-only user feedback entry.
#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub user_id: String,
    pub feedback: String,
    pub timestamp: DateTime<Utc>,
}
