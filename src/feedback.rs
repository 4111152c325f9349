//! Append-only user feedback.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::Feedback;

/// Append a feedback entry for `user_id`.
pub async fn save(pool: &SqlitePool, user_id: &str, text: &str) -> Result<Feedback> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::EmptyFeedback);
    }

    let timestamp = Utc::now();
    sqlx::query("INSERT INTO feedback (user_id, feedback, timestamp) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(text)
        .bind(timestamp.timestamp())
        .execute(pool)
        .await?;

    info!(user_id, "feedback recorded");
    Ok(Feedback {
        user_id: user_id.to_string(),
        feedback: text.to_string(),
        timestamp,
    })
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
        .fetch_one(pool)
        .await?)
}
