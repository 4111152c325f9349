//! CLI command runners.
//!
//! Each `run_*` function opens the database named in the config, calls the
//! matching core operation on behalf of `--user`, and prints the result to
//! stdout. The CLI is a local operator tool: `--user` is trusted and turned
//! straight into a fresh [`Session`].

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::error::Error;
use crate::facets::TagFacetIndex;
use crate::feedback;
use crate::fetcher::create_fetcher;
use crate::generator::create_generator;
use crate::identity::create_resolver;
use crate::ingest::{IngestStatus, IngestionOrchestrator};
use crate::models::Video;
use crate::qa::{QaAnswer, QaOrchestrator};
use crate::query::{self, DateRange, SortOrder, VideoFilter};
use crate::session::Session;
use crate::store::sqlite::SqliteVideoStore;
use crate::store::VideoStore;

async fn open(config: &Config) -> Result<(SqlitePool, Arc<dyn VideoStore>)> {
    let pool = db::connect(config)
        .await
        .with_context(|| format!("opening database {}", config.db.path.display()))?;
    let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::new(pool.clone()));
    Ok((pool, store))
}

fn session_for(user: &str) -> Session {
    Session::new(user, Utc::now())
}

pub async fn run_ingest(config: &Config, user: &str, url: &str) -> Result<()> {
    let (pool, store) = open(config).await?;
    let orchestrator = IngestionOrchestrator::new(
        store,
        Arc::from(create_fetcher(config)?),
        config.ingest.max_duration_secs,
    );

    let result = orchestrator.ingest(&session_for(user), url).await;
    pool.close().await;
    let outcome = result?;

    let verb = match outcome.status {
        IngestStatus::Created => "Processed",
        IngestStatus::Shared => "Added to your library",
        IngestStatus::AlreadyOwned => "Already in your library",
    };
    println!(
        "{}: {} ({})",
        verb,
        query::display_title(&outcome.video.title),
        outcome.video.video_id
    );
    Ok(())
}

pub async fn run_tag_add(config: &Config, user: &str, video_id: &str, tag: &str) -> Result<()> {
    let (pool, store) = open(config).await?;
    let result = TagFacetIndex::new(store)
        .add_tag(&session_for(user), video_id, tag)
        .await;
    pool.close().await;

    let tags = result?;
    println!("{}: [{}]", video_id, tags.join(", "));
    Ok(())
}

pub async fn run_tag_remove(config: &Config, user: &str, video_id: &str, tag: &str) -> Result<()> {
    let (pool, store) = open(config).await?;
    let result = TagFacetIndex::new(store)
        .remove_tag(&session_for(user), video_id, tag)
        .await;
    pool.close().await;

    if result? {
        println!("Removed '{}' from {}", tag.trim(), video_id);
    } else {
        println!("{} has no tag '{}'", video_id, tag.trim());
    }
    Ok(())
}

pub async fn run_tags(config: &Config) -> Result<()> {
    let (pool, store) = open(config).await?;
    let result = TagFacetIndex::new(store).distinct_tags().await;
    pool.close().await;

    for tag in result? {
        println!("{}", tag);
    }
    Ok(())
}

pub async fn run_channels(config: &Config, user: &str) -> Result<()> {
    let (pool, store) = open(config).await?;
    let result = TagFacetIndex::new(store)
        .distinct_channels(&session_for(user))
        .await;
    pool.close().await;

    for channel in result? {
        println!("{}", channel);
    }
    Ok(())
}

/// Options for `list`, as given on the command line.
pub struct ListArgs {
    pub tags: Vec<String>,
    pub channels: Vec<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub no_tags: bool,
    pub sort: SortOrder,
}

pub async fn run_list(config: &Config, user: &str, args: ListArgs) -> Result<()> {
    let filter = VideoFilter {
        tags: Some(args.tags),
        channels: Some(args.channels),
        date_range: DateRange::parse(args.from.as_deref(), args.to.as_deref())?,
        no_tags_only: args.no_tags,
    };

    let (pool, store) = open(config).await?;
    let result = query::list_videos(store.as_ref(), &session_for(user), &filter, args.sort).await;
    pool.close().await;
    let videos = result?;

    if videos.is_empty() {
        println!("No videos.");
        return Ok(());
    }

    for video in &videos {
        print_summary(video);
    }
    Ok(())
}

fn print_summary(video: &Video) {
    println!("{}  {}", video.video_id, query::display_title(&video.title));
    println!("    channel: {}", video.channel);
    println!("    duration: {}s", video.duration_seconds);
    println!(
        "    processed: {}",
        video.processed_at.format("%Y-%m-%d %H:%M:%S")
    );
    if !video.tags.is_empty() {
        println!("    tags: {}", video.tags.join(", "));
    }
    println!();
}

/// Print one of `user`'s videos. Videos the user does not own are reported
/// as not found.
pub async fn run_show(config: &Config, user: &str, video_id: &str) -> Result<()> {
    let session = session_for(user);
    let (pool, store) = open(config).await?;
    let result = store.find_by_video_id(video_id).await;
    pool.close().await;

    let video = result?
        .filter(|v| v.is_owned_by(&session.user_id))
        .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;

    println!("--- Video ---");
    println!("video_id:     {}", video.video_id);
    println!("id:           {}", video.id);
    println!("title:        {}", video.title);
    println!("channel:      {}", video.channel);
    println!("duration:     {}s", video.duration_seconds);
    println!(
        "processed_at: {}",
        video.processed_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!("tags:         {}", video.tags.join(", "));
    println!("users:        {}", video.user_ids.len());
    println!();

    println!("--- Transcript ---");
    println!("{}", video.transcript_text().unwrap_or("(no transcript)"));
    Ok(())
}

fn print_answer(answer: &QaAnswer) {
    println!("Q: {}", answer.question);
    println!();
    println!("{}", answer.answer);
}

pub async fn run_ask_video(config: &Config, user: &str, video_id: &str, question: &str) -> Result<()> {
    let (pool, store) = open(config).await?;
    let qa = QaOrchestrator::new(store, Arc::from(create_generator(&config.generator)?));
    let result = qa.ask_video(&session_for(user), video_id, question).await;
    pool.close().await;

    print_answer(&result?);
    Ok(())
}

pub async fn run_ask_tags(config: &Config, user: &str, tags: &[String], question: &str) -> Result<()> {
    let (pool, store) = open(config).await?;
    let qa = QaOrchestrator::new(store, Arc::from(create_generator(&config.generator)?));
    let result = qa.ask_by_tags(&session_for(user), tags, question).await;
    pool.close().await;

    let answer = result?;
    print_answer(&answer);
    println!();
    println!("(from {} videos: {})", answer.video_ids.len(), answer.video_ids.join(", "));
    Ok(())
}

pub async fn run_feedback(config: &Config, user: &str, text: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = feedback::save(&pool, user, text).await;
    pool.close().await;

    result?;
    println!("Thanks for the feedback.");
    Ok(())
}

pub fn run_login_url(config: &Config) -> Result<()> {
    let resolver = create_resolver(&config.identity)?;
    println!("{}", resolver.authorization_url()?);
    Ok(())
}
