//! Library query engine.
//!
//! [`list_videos`] returns the session user's videos that satisfy every
//! supplied filter, in the requested order:
//!
//! | Filter | A video matches when |
//! |--------|----------------------|
//! | `tags` | it carries at least one of the tags |
//! | `no_tags_only` | it carries no tags (overrides `tags`) |
//! | `channels` | its channel is one of the channels |
//! | `date_range` | `start 00:00:00 ≤ processed_at ≤ end 23:59:59` (UTC) |
//!
//! Ownership by the session user is always required. Sorting is stable, so
//! ties keep insertion order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::Video;
use crate::session::Session;
use crate::store::VideoStore;

const TITLE_DISPLAY_CHARS: usize = 25;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidDateRange(format!(
                "{} is before {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering a single day.
    pub fn day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Build a range from optional bounds. A lone bound selects that one day.
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Option<Self>> {
        match (start, end) {
            (None, None) => Ok(None),
            (Some(day), None) | (None, Some(day)) => Ok(Some(Self::day(day))),
            (Some(start), Some(end)) => Self::new(start, end).map(Some),
        }
    }

    /// Parse optional `YYYY-MM-DD` bounds.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
        Self::from_bounds(parse_day(start)?, parse_day(end)?)
    }

    /// `(start 00:00:00, end 23:59:59)` in UTC.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let end = self
            .end
            .and_hms_opt(23, 59, 59)
            .unwrap_or_default()
            .and_utc();
        (start, end)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds();
        start <= at && at <= end
    }
}

fn parse_day(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| Error::InvalidDateRange(format!("expected YYYY-MM-DD, got '{}'", s)))
        })
        .transpose()
}

/// Optional library filters. Unset fields and empty lists do not filter.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Keep videos carrying any of these tags.
    pub tags: Option<Vec<String>>,
    /// Keep videos from any of these channels.
    pub channels: Option<Vec<String>>,
    /// Keep videos processed within these days.
    pub date_range: Option<DateRange>,
    /// Keep only untagged videos. Takes precedence over `tags`.
    pub no_tags_only: bool,
}

impl VideoFilter {
    /// Whether `video` passes every filter. Ownership is checked separately.
    pub fn matches(&self, video: &Video) -> bool {
        if self.no_tags_only {
            if !video.tags.is_empty() {
                return false;
            }
        } else if let Some(tags) = non_empty(&self.tags) {
            if !tags.iter().any(|t| video.has_tag(t)) {
                return false;
            }
        }

        if let Some(channels) = non_empty(&self.channels) {
            if !channels.iter().any(|c| *c == video.channel) {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !range.contains(video.processed_at) {
                return false;
            }
        }

        true
    }
}

fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref().filter(|l| !l.is_empty())
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Most recently processed first.
    #[default]
    Newest,
    /// Least recently processed first.
    Oldest,
    /// Longest duration first.
    Longest,
    /// Shortest duration first.
    Shortest,
}

impl SortOrder {
    /// Stable in-place sort.
    pub fn apply(&self, videos: &mut [Video]) {
        match self {
            SortOrder::Newest => videos.sort_by(|a, b| b.processed_at.cmp(&a.processed_at)),
            SortOrder::Oldest => videos.sort_by(|a, b| a.processed_at.cmp(&b.processed_at)),
            SortOrder::Longest => videos.sort_by(|a, b| b.duration_seconds.cmp(&a.duration_seconds)),
            SortOrder::Shortest => {
                videos.sort_by(|a, b| a.duration_seconds.cmp(&b.duration_seconds))
            }
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::Longest => "longest",
            SortOrder::Shortest => "shortest",
        };
        f.write_str(name)
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "longest" => Ok(SortOrder::Longest),
            "shortest" => Ok(SortOrder::Shortest),
            other => Err(format!(
                "unknown sort '{}'; expected newest, oldest, longest or shortest",
                other
            )),
        }
    }
}

/// The session user's videos matching `filter`, ordered by `sort`.
///
/// An empty result is not an error.
pub async fn list_videos(
    store: &dyn VideoStore,
    session: &Session,
    filter: &VideoFilter,
    sort: SortOrder,
) -> Result<Vec<Video>> {
    if filter.no_tags_only && non_empty(&filter.tags).is_some() {
        warn!("both no-tags-only and a tag filter given; ignoring the tag filter");
    }

    let mut videos: Vec<Video> = store
        .videos_for_user(&session.user_id)
        .await?
        .into_iter()
        .filter(|v| filter.matches(v))
        .collect();
    sort.apply(&mut videos);

    debug!(user_id = %session.user_id, count = videos.len(), %sort, "listed videos");
    Ok(videos)
}

/// Title for list output: whitespace collapsed, cut to 25 characters.
pub fn display_title(title: &str) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= TITLE_DISPLAY_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(TITLE_DISPLAY_CHARS).collect();
    format!("{}...", cut.trim_end())
}
