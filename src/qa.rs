//! Question answering over stored transcripts.
//!
//! Two modes, both delegating to an [`AnswerGenerator`]:
//!
//! - [`QaOrchestrator::ask_video`]: one video owned by the session user.
//! - [`QaOrchestrator::ask_by_tags`]: every video carrying any of the tags,
//!   across the whole library. Videos without a transcript are skipped.
//!
//! The generator's answer is returned untouched.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::facets::normalize_tag;
use crate::session::Session;
use crate::store::VideoStore;
use crate::traits::AnswerGenerator;

/// A question and the generator's verbatim answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaAnswer {
    pub question: String,
    pub answer: String,
    /// Videos whose transcripts were used as context.
    pub video_ids: Vec<String>,
}

pub struct QaOrchestrator {
    store: Arc<dyn VideoStore>,
    generator: Arc<dyn AnswerGenerator>,
}

fn require_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::EmptyQuestion);
    }
    Ok(question)
}

impl QaOrchestrator {
    pub fn new(store: Arc<dyn VideoStore>, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self { store, generator }
    }

    /// Answer `question` from a single video's transcript.
    pub async fn ask_video(
        &self,
        session: &Session,
        video_id: &str,
        question: &str,
    ) -> Result<QaAnswer> {
        let question = require_question(question)?;

        let video = self
            .store
            .find_by_video_id(video_id)
            .await?
            .filter(|v| v.is_owned_by(&session.user_id))
            .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;

        let transcript = video
            .transcript_text()
            .ok_or_else(|| Error::TranscriptMissing(video_id.to_string()))?
            .to_string();

        let answer = self.generate(question, vec![transcript]).await?;
        info!(video_id, user_id = %session.user_id, "answered question about video");

        Ok(QaAnswer {
            question: question.to_string(),
            answer,
            video_ids: vec![video.video_id],
        })
    }

    /// Answer `question` from every tagged video that has a transcript.
    pub async fn ask_by_tags(
        &self,
        session: &Session,
        tags: &[String],
        question: &str,
    ) -> Result<QaAnswer> {
        let question = require_question(question)?;
        let tags = tags
            .iter()
            .map(|t| normalize_tag(t))
            .collect::<Result<Vec<_>>>()?;

        let videos = self.store.videos_with_any_tag(&tags).await?;
        let (video_ids, transcripts): (Vec<String>, Vec<String>) = videos
            .iter()
            .filter_map(|v| {
                v.transcript_text()
                    .map(|t| (v.video_id.clone(), t.to_string()))
            })
            .unzip();

        if transcripts.is_empty() {
            warn!(?tags, matched = videos.len(), "no transcripts for tags");
            return Err(Error::NoContentAvailable);
        }

        let answer = self.generate(question, transcripts).await?;
        info!(
            ?tags,
            videos = video_ids.len(),
            skipped = videos.len() - video_ids.len(),
            user_id = %session.user_id,
            "answered question across tags"
        );

        Ok(QaAnswer {
            question: question.to_string(),
            answer,
            video_ids,
        })
    }

    async fn generate(&self, question: &str, transcripts: Vec<String>) -> Result<String> {
        self.generator
            .generate(question, &transcripts)
            .await
            .map_err(|e| {
                warn!(error = %e, "answer generation failed");
                e
            })
    }
}
