//! # AskOnTube
//!
//! A shared library of YouTube transcripts with question answering.
//!
//! Users submit videos; each video's transcript is fetched and stored once no
//! matter how many users submit it. Videos carry up to three tags, can be
//! filtered and sorted per user, and serve as context for questions sent to a
//! language model, either one video at a time or across every video with a
//! given tag.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────┐      ┌───────────────────┐
//!   url ─────────▶│ IngestionOrchestr. │─────▶│ TranscriptFetcher │
//!                 └─────────┬──────────┘      └───────────────────┘
//!                           ▼
//! ┌──────────────┐   ┌─────────────┐   ┌────────────────┐
//! │ TagFacetIndex│──▶│ VideoStore  │◀──│ query engine   │
//! └──────────────┘   │ SQLite/mem  │   └────────────────┘
//!                    └──────┬──────┘
//!                           ▼
//!                 ┌────────────────────┐      ┌───────────────────┐
//!   question ────▶│ QaOrchestrator     │─────▶│ AnswerGenerator   │
//!                 └────────────────────┘      └───────────────────┘
//! ```
//!
//! Every orchestrator call takes an explicit [`session::Session`].
//!
//! ## Quick Start
//!
//! ```bash
//! askontube init
//! askontube ingest "https://youtu.be/dQw4w9WgXcQ" --user u1
//! askontube tag add dQw4w9WgXcQ music
//! askontube list --user u1 --tag music --sort longest
//! askontube ask tags --tag music --user u1 "What is this song about?"
//! askontube serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error type and taxonomy |
//! | [`models`] | Core data types |
//! | [`store`] | Video registry backends |
//! | [`ingest`] | Deduplicated ingestion |
//! | [`facets`] | Tag and channel vocabularies, tag mutation |
//! | [`query`] | Library filters and sorting |
//! | [`qa`] | Question answering over transcripts |
//! | [`session`] | Sessions and login |
//! | [`users`] | User records |
//! | [`feedback`] | Feedback records |
//! | [`traits`] | Fetcher, generator and identity seams |
//! | [`fetcher`] | Transcript service client |
//! | [`generator`] | LLM answer generators |
//! | [`identity`] | OAuth identity resolvers |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command runners |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod facets;
pub mod feedback;
pub mod fetcher;
pub mod generator;
pub mod identity;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod qa;
pub mod query;
pub mod server;
pub mod session;
pub mod store;
pub mod traits;
pub mod users;
