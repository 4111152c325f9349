//! SQLite-backed [`VideoStore`] implementation.
//!
//! `tags` and `user_ids` are JSON arrays in the `videos` row. Mutations are
//! single `UPDATE` statements whose `WHERE` clause carries the guard
//! (array length, membership via `json_each`), so a concurrent writer can
//! never slip between the check and the write. When a guarded update
//! touches no row, the current record is read back only to pick the error.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewVideo, Video, MAX_TAGS};

use super::VideoStore;

const VIDEO_COLUMNS: &str =
    "id, video_id, title, channel, duration_seconds, transcript, tags, user_ids, processed_at";

/// Guarded-update attempts before giving up on a tag that keeps racing.
const MAX_TAG_ATTEMPTS: usize = 3;

/// SQLite implementation of the [`VideoStore`] trait.
pub struct SqliteVideoStore {
    pool: SqlitePool,
}

impl SqliteVideoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_video(row: &SqliteRow) -> Result<Video> {
    let tags: String = row.try_get("tags")?;
    let user_ids: String = row.try_get("user_ids")?;
    let processed_at: i64 = row.try_get("processed_at")?;

    Ok(Video {
        id: row.try_get("id")?,
        video_id: row.try_get("video_id")?,
        title: row.try_get("title")?,
        channel: row.try_get("channel")?,
        duration_seconds: row.try_get("duration_seconds")?,
        transcript: row.try_get("transcript")?,
        tags: serde_json::from_str(&tags)?,
        user_ids: serde_json::from_str(&user_ids)?,
        processed_at: DateTime::from_timestamp(processed_at, 0).unwrap_or_default(),
    })
}

fn rows_to_videos(rows: &[SqliteRow]) -> Result<Vec<Video>> {
    rows.iter().map(row_to_video).collect()
}

#[async_trait]
impl VideoStore for SqliteVideoStore {
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<Video>> {
        let sql = format!("SELECT {} FROM videos WHERE video_id = ?", VIDEO_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_video).transpose()
    }

    async fn create(&self, new: NewVideo, owner: &str) -> Result<Video> {
        let id = Uuid::new_v4().to_string();
        let user_ids = serde_json::to_string(&[owner])?;

        let result = sqlx::query(
            r#"
            INSERT INTO videos (id, video_id, title, channel, duration_seconds,
                                transcript, tags, user_ids, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, '[]', ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.video_id)
        .bind(&new.title)
        .bind(&new.channel)
        .bind(new.duration_seconds)
        .bind(&new.transcript)
        .bind(&user_ids)
        .bind(new.processed_at.timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(Error::DuplicateKey(new.video_id));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Video {
            id,
            video_id: new.video_id,
            title: new.title,
            channel: new.channel,
            duration_seconds: new.duration_seconds,
            transcript: new.transcript,
            tags: Vec::new(),
            user_ids: vec![owner.to_string()],
            processed_at: DateTime::from_timestamp(new.processed_at.timestamp(), 0)
                .unwrap_or_default(),
        })
    }

    async fn attach_user(&self, video_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET user_ids = json_insert(user_ids, '$[#]', ?)
            WHERE video_id = ?
              AND NOT EXISTS (SELECT 1 FROM json_each(videos.user_ids) WHERE json_each.value = ?)
            "#,
        )
        .bind(user_id)
        .bind(video_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.find_by_video_id(video_id).await? {
            Some(_) => Ok(false),
            None => Err(Error::VideoNotFound(video_id.to_string())),
        }
    }

    async fn add_tag(&self, video_id: &str, tag: &str) -> Result<Vec<String>> {
        for _ in 0..MAX_TAG_ATTEMPTS {
            let updated: Option<String> = sqlx::query_scalar(
                r#"
                UPDATE videos
                SET tags = json_insert(tags, '$[#]', ?)
                WHERE video_id = ?
                  AND json_array_length(tags) < ?
                  AND NOT EXISTS (SELECT 1 FROM json_each(videos.tags) WHERE json_each.value = ?)
                RETURNING tags
                "#,
            )
            .bind(tag)
            .bind(video_id)
            .bind(MAX_TAGS as i64)
            .bind(tag)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(tags) = updated {
                return Ok(serde_json::from_str(&tags)?);
            }

            let video = self
                .find_by_video_id(video_id)
                .await?
                .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;
            if video.tags.len() >= MAX_TAGS {
                return Err(Error::TagLimitExceeded { limit: MAX_TAGS });
            }
            if video.has_tag(tag) {
                return Err(Error::TagAlreadyExists(tag.to_string()));
            }
            // The record changed between the update and the read; try again.
        }
        warn!(video_id, tag, attempts = MAX_TAG_ATTEMPTS, "tag update lost every race");
        Err(Error::TagContention(video_id.to_string()))
    }

    async fn remove_tag(&self, video_id: &str, tag: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET tags = (
                SELECT json_group_array(json_each.value)
                FROM json_each(videos.tags)
                WHERE json_each.value != ?
            )
            WHERE video_id = ?
              AND EXISTS (SELECT 1 FROM json_each(videos.tags) WHERE json_each.value = ?)
            "#,
        )
        .bind(tag)
        .bind(video_id)
        .bind(tag)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.find_by_video_id(video_id).await? {
            Some(_) => Ok(false),
            None => Err(Error::VideoNotFound(video_id.to_string())),
        }
    }

    async fn videos_for_user(&self, user_id: &str) -> Result<Vec<Video>> {
        let sql = format!(
            r#"
            SELECT {} FROM videos
            WHERE EXISTS (SELECT 1 FROM json_each(videos.user_ids) WHERE json_each.value = ?)
            ORDER BY rowid ASC
            "#,
            VIDEO_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows_to_videos(&rows)
    }

    async fn videos_with_any_tag(&self, tags: &[String]) -> Result<Vec<Video>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = serde_json::to_string(tags)?;
        let sql = format!(
            r#"
            SELECT {} FROM videos
            WHERE EXISTS (
                SELECT 1 FROM json_each(videos.tags) AS have
                JOIN json_each(?) AS want ON have.value = want.value
            )
            ORDER BY rowid ASC
            "#,
            VIDEO_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&wanted)
            .fetch_all(&self.pool)
            .await?;
        rows_to_videos(&rows)
    }

    async fn distinct_tags(&self) -> Result<Vec<String>> {
        let tags: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT t.value
            FROM videos, json_each(videos.tags) AS t
            WHERE t.type = 'text'
            ORDER BY t.value ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn distinct_channels(&self, user_id: &str) -> Result<Vec<String>> {
        let channels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT channel FROM videos
            WHERE EXISTS (SELECT 1 FROM json_each(videos.user_ids) WHERE json_each.value = ?)
            ORDER BY channel ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }
}
