//! Seams to the external collaborators.
//!
//! The registry core never talks to YouTube, an LLM or an OAuth provider
//! directly. It calls these three traits, each a one-shot request/response
//! operation:
//!
//! ```text
//!  ┌──────────────────────┐     ┌────────────────────┐     ┌──────────────────┐
//!  │ IngestionOrchestrator│────▶│ TranscriptFetcher  │     │ IdentityResolver │◀── session::login
//!  └──────────────────────┘     └────────────────────┘     └──────────────────┘
//!  ┌──────────────────────┐     ┌────────────────────┐
//!  │ QaOrchestrator       │────▶│ AnswerGenerator    │
//!  └──────────────────────┘     └────────────────────┘
//! ```
//!
//! Built-in implementations live in [`fetcher`](crate::fetcher),
//! [`generator`](crate::generator) and [`identity`](crate::identity). Tests
//! plug in their own.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use askontube::error::Result;
//! use askontube::traits::AnswerGenerator;
//!
//! pub struct EchoGenerator;
//!
//! #[async_trait]
//! impl AnswerGenerator for EchoGenerator {
//!     async fn generate(&self, question: &str, transcripts: &[String]) -> Result<String> {
//!         Ok(format!("{} ({} transcripts)", question, transcripts.len()))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FetchedVideo, Identity};

/// Fetches a video's metadata and transcript.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch `{title, channel, duration_seconds, transcript}` for a video.
    ///
    /// `url` is the URL the user submitted; `video_id` is the natural key
    /// already extracted from it.
    ///
    /// # Errors
    ///
    /// `DurationExceeded` if the video is longer than the fetcher accepts,
    /// `InvalidUrl` if the source rejects the URL, `Fetch` for anything else.
    async fn fetch(&self, url: &str, video_id: &str) -> Result<FetchedVideo>;
}

/// Produces an answer to a question from transcript context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `question` using `transcripts` as context.
    ///
    /// The returned text is shown to the user verbatim.
    ///
    /// # Errors
    ///
    /// `Generation` when the model is unreachable or returns an error.
    async fn generate(&self, question: &str, transcripts: &[String]) -> Result<String>;
}

/// Exchanges an authorization code for a verified identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// URL the user visits to start the provider's consent flow.
    fn authorization_url(&self) -> Result<String>;

    /// Resolve `auth_code` into `{email, name, picture}`.
    ///
    /// # Errors
    ///
    /// `Auth` when the code is rejected or the provider is unreachable.
    async fn resolve(&self, auth_code: &str) -> Result<Identity>;
}
