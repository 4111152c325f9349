//! Error types for the video registry and its orchestrators.
//!
//! Every fallible core operation returns [`Error`]. Variants are the concrete
//! failures; [`Error::kind`] groups them into the coarse [`ErrorKind`]
//! taxonomy that callers render (warning vs. dependency message vs. re-login).
//!
//! Expected business outcomes (`LimitExceeded`, `Conflict`, `NotFound`) are
//! ordinary values, never panics. A failed operation never leaves partial
//! state behind.

use thiserror::Error;

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or empty input (missing question, unparsable URL, empty tag).
    Validation,
    /// Tag-count or duration ceiling reached.
    LimitExceeded,
    /// No such video, no transcript, no matching videos.
    NotFound,
    /// Transcript fetcher, answer generator or identity provider failed.
    DependencyFailure,
    /// Duplicate natural key or duplicate tag.
    Conflict,
    /// No session, or the session has expired.
    Unauthorized,
    /// Storage failure.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DependencyFailure => "dependency_failure",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("tag must not be empty")]
    EmptyTag,

    #[error("feedback must not be empty")]
    EmptyFeedback,

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("video is {duration}s long; the limit is {limit}s")]
    DurationExceeded { duration: i64, limit: i64 },

    #[error("a video can carry at most {limit} tags")]
    TagLimitExceeded { limit: usize },

    #[error("video not found: {0}")]
    VideoNotFound(String),

    #[error("no transcript stored for video {0}")]
    TranscriptMissing(String),

    #[error("no transcripts available for the selected tags")]
    NoContentAvailable,

    #[error("transcript fetch failed: {0}")]
    Fetch(String),

    #[error("answer generation failed: {0}")]
    Generation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("video already registered: {0}")]
    DuplicateKey(String),

    #[error("tag already present: {0}")]
    TagAlreadyExists(String),

    #[error("tags of video {0} kept changing under concurrent updates; try again")]
    TagContention(String),

    #[error("session expired; sign in again")]
    SessionExpired,

    #[error("sign in required")]
    Unauthenticated,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("corrupt stored record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidUrl(_)
            | Error::EmptyQuestion
            | Error::EmptyTag
            | Error::EmptyFeedback
            | Error::InvalidDateRange(_) => ErrorKind::Validation,
            Error::DurationExceeded { .. } | Error::TagLimitExceeded { .. } => {
                ErrorKind::LimitExceeded
            }
            Error::VideoNotFound(_) | Error::TranscriptMissing(_) | Error::NoContentAvailable => {
                ErrorKind::NotFound
            }
            Error::Fetch(_) | Error::Generation(_) | Error::Auth(_) => {
                ErrorKind::DependencyFailure
            }
            Error::DuplicateKey(_) | Error::TagAlreadyExists(_) | Error::TagContention(_) => {
                ErrorKind::Conflict
            }
            Error::SessionExpired | Error::Unauthenticated => ErrorKind::Unauthorized,
            Error::Storage(_) | Error::Corrupt(_) => ErrorKind::Internal,
        }
    }

    /// True for outcomes the user caused and can correct (rendered as a warning).
    pub fn is_expected(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation
                | ErrorKind::LimitExceeded
                | ErrorKind::NotFound
                | ErrorKind::Conflict
        )
    }
}
