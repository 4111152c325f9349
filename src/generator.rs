//! Answer generator implementations.
//!
//! - **[`DisabledGenerator`]**: fails every request; used when
//!   `generator.provider = "disabled"`.
//! - **[`OpenAiAnswerGenerator`]**: calls the OpenAI chat completions API
//!   with the transcripts as context and the question as the user turn.
//!
//! Each question is sent exactly once. Any non-2xx status or network error
//! comes back as [`Error::Generation`]; retrying is left to the user.
//!
//! Requires the `OPENAI_API_KEY` environment variable.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::traits::AnswerGenerator;

const DEFAULT_SYSTEM_PROMPT: &str = "You answer questions about YouTube videos. \
Use only the transcripts provided as context. If the transcripts do not contain \
the answer, say so plainly. Answer in the language of the question.";

/// Generator that always fails.
pub struct DisabledGenerator;

#[async_trait]
impl AnswerGenerator for DisabledGenerator {
    async fn generate(&self, _question: &str, _transcripts: &[String]) -> Result<String> {
        Err(Error::Generation(
            "answer generator is disabled; set [generator] provider in config".to_string(),
        ))
    }
}

/// Answer generator backed by the OpenAI chat completions API.
pub struct OpenAiAnswerGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl OpenAiAnswerGenerator {
    /// Create a generator from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Generation("OPENAI_API_KEY environment variable not set".to_string()))?;
        Self::with_api_key(config, api_key)
    }

    /// Create a generator with an explicit API key.
    pub fn with_api_key(config: &GeneratorConfig, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Generation("generator.model required for OpenAI".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Generation(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        })
    }
}

/// Build the user turn: numbered transcript blocks followed by the question.
pub fn build_user_message(question: &str, transcripts: &[String]) -> String {
    let mut context = String::new();
    for (i, transcript) in transcripts.iter().enumerate() {
        context.push_str(&format!("[Transcript {}]\n{}\n\n", i + 1, transcript.trim()));
    }
    format!(
        "Context Information:\n==================\n{}User Question:\n==================\n{}\n",
        context,
        question.trim()
    )
}

/// Extract `choices[0].message.content` from a chat completions response.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Generation("invalid OpenAI response: missing content".to_string()))
}

#[async_trait]
impl AnswerGenerator for OpenAiAnswerGenerator {
    async fn generate(&self, question: &str, transcripts: &[String]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": build_user_message(question, transcripts) },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                Error::Generation(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(%status, "OpenAI request rejected");
            return Err(Error::Generation(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        parse_chat_response(&json)
    }
}

/// Create the generator selected by `config.provider`.
///
/// | Config Value | Generator |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"openai"` | [`OpenAiAnswerGenerator`] |
pub fn create_generator(config: &GeneratorConfig) -> Result<Box<dyn AnswerGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAiAnswerGenerator::new(config)?)),
        other => Err(Error::Generation(format!("unknown generator provider: {}", other))),
    }
}
