//! # AskOnTube CLI (`askontube`)
//!
//! Register YouTube videos once, tag and filter the shared library, and ask
//! questions answered from stored transcripts.
//!
//! ## Usage
//!
//! ```bash
//! askontube --config ./config/askontube.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askontube init` | Create the SQLite database and run schema migrations |
//! | `askontube ingest <url> --user <id>` | Register a video for a user |
//! | `askontube tag add <video_id> <tag>` | Tag a video (at most 3 tags) |
//! | `askontube tag remove <video_id> <tag>` | Remove a tag |
//! | `askontube tags` | List the tag vocabulary |
//! | `askontube channels --user <id>` | List a user's channels |
//! | `askontube list --user <id>` | List a user's videos with filters |
//! | `askontube show <video_id> --user <id>` | Print one of your videos and its transcript |
//! | `askontube ask video <video_id> --user <id> "<q>"` | Ask about one video |
//! | `askontube ask tags --tag <t> --user <id> "<q>"` | Ask across tagged videos |
//! | `askontube feedback --user <id> "<text>"` | Leave feedback |
//! | `askontube login-url` | Print the sign-in URL |
//! | `askontube serve` | Start the HTTP server |
//!
//! Logs go to stderr; set `RUST_LOG` to change the level.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use askontube::commands::{self, ListArgs};
use askontube::config;
use askontube::error::Error;
use askontube::migrate;
use askontube::query::SortOrder;
use askontube::server;

/// AskOnTube: a shared YouTube transcript library with question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/askontube.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "askontube",
    about = "AskOnTube: register YouTube transcripts once, tag them, and ask questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/askontube.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Register a video for a user.
    ///
    /// Known videos are shared with the user without refetching the
    /// transcript. New videos are fetched and checked against the duration
    /// ceiling before anything is stored.
    Ingest {
        /// YouTube URL (watch, youtu.be, shorts, embed or live).
        url: String,

        #[arg(long)]
        user: String,
    },

    /// Add or remove a video's tags.
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// List every tag in use.
    Tags,

    /// List the channels of a user's videos.
    Channels {
        #[arg(long)]
        user: String,
    },

    /// List a user's videos.
    List {
        #[arg(long)]
        user: String,

        /// Keep videos carrying any of these tags (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Keep videos from any of these channels (repeatable).
        #[arg(long = "channel")]
        channels: Vec<String>,

        /// Only videos processed on or after this day (YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,

        /// Only videos processed on or before this day (YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,

        /// Only untagged videos. Overrides `--tag`.
        #[arg(long)]
        no_tags: bool,

        #[arg(long, value_enum, default_value_t = SortOrder::Newest)]
        sort: SortOrder,
    },

    /// Print one of your videos with its full transcript.
    Show {
        video_id: String,

        #[arg(long)]
        user: String,
    },

    /// Ask a question answered from stored transcripts.
    Ask {
        #[command(subcommand)]
        target: AskTarget,
    },

    /// Leave feedback.
    Feedback {
        #[arg(long)]
        user: String,

        text: String,
    },

    /// Print the identity provider's sign-in URL.
    LoginUrl,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum TagAction {
    /// Add a tag. Fails if the video already has 3 tags or this tag.
    Add {
        video_id: String,
        tag: String,

        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Remove a tag. Removing an absent tag is not an error.
    Remove {
        video_id: String,
        tag: String,

        #[arg(long, default_value = "cli")]
        user: String,
    },
}

#[derive(Subcommand)]
enum AskTarget {
    /// Ask about one of your videos.
    Video {
        video_id: String,

        #[arg(long)]
        user: String,

        question: String,
    },
    /// Ask across every video carrying any of the tags.
    Tags {
        #[arg(long = "tag", required = true)]
        tags: Vec<String>,

        #[arg(long)]
        user: String,

        question: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("askontube=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<Error>() {
            Some(core) if core.is_expected() => {
                eprintln!("Warning: {}", core);
                ExitCode::from(2)
            }
            _ => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { url, user } => {
            commands::run_ingest(&cfg, &user, &url).await?;
        }
        Commands::Tag { action } => match action {
            TagAction::Add { video_id, tag, user } => {
                commands::run_tag_add(&cfg, &user, &video_id, &tag).await?;
            }
            TagAction::Remove { video_id, tag, user } => {
                commands::run_tag_remove(&cfg, &user, &video_id, &tag).await?;
            }
        },
        Commands::Tags => {
            commands::run_tags(&cfg).await?;
        }
        Commands::Channels { user } => {
            commands::run_channels(&cfg, &user).await?;
        }
        Commands::List {
            user,
            tags,
            channels,
            from,
            to,
            no_tags,
            sort,
        } => {
            let args = ListArgs {
                tags,
                channels,
                from,
                to,
                no_tags,
                sort,
            };
            commands::run_list(&cfg, &user, args).await?;
        }
        Commands::Show { video_id, user } => {
            commands::run_show(&cfg, &user, &video_id).await?;
        }
        Commands::Ask { target } => match target {
            AskTarget::Video {
                video_id,
                user,
                question,
            } => {
                commands::run_ask_video(&cfg, &user, &video_id, &question).await?;
            }
            AskTarget::Tags {
                tags,
                user,
                question,
            } => {
                commands::run_ask_tags(&cfg, &user, &tags, &question).await?;
            }
        },
        Commands::Feedback { user, text } => {
            commands::run_feedback(&cfg, &user, &text).await?;
        }
        Commands::LoginUrl => {
            commands::run_login_url(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
