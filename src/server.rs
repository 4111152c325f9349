//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/auth/url` | Identity provider consent URL |
//! | `GET`  | `/auth/callback?code=` | Provider redirect target; same as the `POST` |
//! | `POST` | `/auth/callback` | Exchange `{code}` for a bearer token |
//! | `POST` | `/auth/logout` | Drop the caller's session |
//! | `GET`  | `/me` | The signed-in user's profile |
//! | `POST` | `/videos` | Ingest `{url}` |
//! | `GET`  | `/videos` | List the caller's videos (`tags`, `channels`, `from`, `to`, `no_tags`, `sort`) |
//! | `GET`  | `/videos/{video_id}` | One video, including its transcript |
//! | `POST` | `/videos/{video_id}/tags` | Add `{tag}` |
//! | `DELETE` | `/videos/{video_id}/tags` | Remove `{tag}` |
//! | `GET`  | `/tags` | Tag vocabulary |
//! | `GET`  | `/channels` | The caller's channel vocabulary |
//! | `POST` | `/ask/video` | Ask `{video_id, question}` |
//! | `POST` | `/ask/tags` | Ask `{tags, question}` |
//! | `POST` | `/feedback` | Leave `{feedback}` |
//!
//! Every route except `/health` and `/auth/*` requires
//! `Authorization: Bearer <token>`. Each authenticated request slides the
//! session deadline. List filters take comma-separated values
//! (`?tags=rust,ml&channels=Some%20Channel`).
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "limit_exceeded", "message": "a video can carry at most 3 tags" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `validation_error` | 400 |
//! | `unauthorized` | 401 |
//! | `not_found` | 404 |
//! | `conflict` | 409 |
//! | `limit_exceeded` | 422 |
//! | `internal` | 500 |
//! | `dependency_failure` | 502 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::error::{Error, ErrorKind};
use crate::facets::TagFacetIndex;
use crate::feedback;
use crate::fetcher::create_fetcher;
use crate::generator::create_generator;
use crate::identity::create_resolver;
use crate::ingest::{IngestOutcome, IngestStatus, IngestionOrchestrator};
use crate::migrate;
use crate::models::{Feedback, User, Video};
use crate::qa::{QaAnswer, QaOrchestrator};
use crate::query::{self, DateRange, SortOrder, VideoFilter};
use crate::session::{self, Session, SessionPolicy, SessionRegistry};
use crate::store::sqlite::SqliteVideoStore;
use crate::store::VideoStore;
use crate::traits::{AnswerGenerator, IdentityResolver, TranscriptFetcher};
use crate::users;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn VideoStore>,
    pool: SqlitePool,
    ingest: Arc<IngestionOrchestrator>,
    facets: Arc<TagFacetIndex>,
    qa: Arc<QaOrchestrator>,
    resolver: Arc<dyn IdentityResolver>,
    sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Wire the orchestrators over a migrated pool and the given collaborators.
    pub fn new(
        pool: SqlitePool,
        fetcher: Arc<dyn TranscriptFetcher>,
        generator: Arc<dyn AnswerGenerator>,
        resolver: Arc<dyn IdentityResolver>,
        max_duration_secs: i64,
        policy: SessionPolicy,
    ) -> Self {
        let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::new(pool.clone()));
        Self {
            ingest: Arc::new(IngestionOrchestrator::new(
                store.clone(),
                fetcher,
                max_duration_secs,
            )),
            facets: Arc::new(TagFacetIndex::new(store.clone())),
            qa: Arc::new(QaOrchestrator::new(store.clone(), generator)),
            store,
            pool,
            resolver,
            sessions: Arc::new(SessionRegistry::new(policy)),
        }
    }

    /// Build the state described by `config`, with the configured collaborators.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;

        Ok(Self::new(
            pool,
            Arc::from(create_fetcher(config)?),
            Arc::from(create_generator(&config.generator)?),
            Arc::from(create_resolver(&config.identity)?),
            config.ingest.max_duration_secs,
            SessionPolicy::from_secs(config.session.timeout_secs),
        ))
    }

    /// Resolve the bearer token in `headers` to a live session.
    fn authenticate(&self, headers: &HeaderMap) -> Result<Session, AppError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Error::Unauthenticated)?;
        Ok(self.sessions.authenticate(token, Utc::now())?)
    }
}

/// Build the router over `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/auth/url", get(handle_auth_url))
        .route(
            "/auth/callback",
            get(handle_auth_redirect).post(handle_auth_callback),
        )
        .route("/auth/logout", post(handle_logout))
        .route("/me", get(handle_me))
        .route("/videos", post(handle_ingest).get(handle_list_videos))
        .route("/videos/{video_id}", get(handle_get_video))
        .route(
            "/videos/{video_id}/tags",
            post(handle_add_tag).delete(handle_remove_tag),
        )
        .route("/tags", get(handle_tags))
        .route("/channels", get(handle_channels))
        .route("/ask/video", post(handle_ask_video))
        .route("/ask/tags", post(handle_ask_tags))
        .route("/feedback", post(handle_feedback))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        generator = config.generator.is_enabled(),
        identity = config.identity.is_enabled(),
        "server listening"
    );
    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"conflict"`, `"not_found"`).
    code: String,
    message: String,
}

/// Converts a core [`Error`] into an HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::LimitExceeded => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DependencyFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let kind = err.kind();
        let message = if kind == ErrorKind::Internal {
            error!(error = %err, "request failed");
            "internal error".to_string()
        } else {
            err.to_string()
        };
        AppError {
            status: status_for(kind),
            code: kind.code(),
            message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /auth ============

#[derive(Serialize)]
struct AuthUrlResponse {
    url: String,
}

async fn handle_auth_url(State(state): State<AppState>) -> ApiResult<Json<AuthUrlResponse>> {
    Ok(Json(AuthUrlResponse {
        url: state.resolver.authorization_url()?,
    }))
}

#[derive(Deserialize)]
struct CallbackRequest {
    code: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user_id: String,
    name: String,
    login_time: DateTime<Utc>,
}

async fn handle_auth_callback(
    State(state): State<AppState>,
    Json(req): Json<CallbackRequest>,
) -> ApiResult<Json<LoginResponse>> {
    sign_in(&state, &req.code).await
}

/// Provider redirect target: `GET /auth/callback?code=...`.
async fn handle_auth_redirect(
    State(state): State<AppState>,
    Query(req): Query<CallbackRequest>,
) -> ApiResult<Json<LoginResponse>> {
    sign_in(&state, &req.code).await
}

async fn sign_in(state: &AppState, code: &str) -> ApiResult<Json<LoginResponse>> {
    let session = session::login(state.resolver.as_ref(), &state.pool, code, Utc::now()).await?;
    let user_id = session.user_id.clone();
    let name = session.name.clone();
    let login_time = session.login_time;
    let token = state.sessions.open(session);
    Ok(Json(LoginResponse {
        token,
        user_id,
        name,
        login_time,
    }))
}

async fn handle_logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(Error::Unauthenticated)?;
    state.sessions.close(token);
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<User>> {
    let session = state.authenticate(&headers)?;
    let user = users::get(&state.pool, &session.user_id)
        .await?
        .ok_or(Error::Unauthenticated)?;
    Ok(Json(user))
}

// ============ /videos ============

#[derive(Deserialize)]
struct IngestRequest {
    url: String,
}

async fn handle_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IngestRequest>,
) -> ApiResult<(StatusCode, Json<IngestOutcome>)> {
    let session = state.authenticate(&headers)?;
    let outcome = state.ingest.ingest(&session, &req.url).await?;
    let status = match outcome.status {
        IngestStatus::Created => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

#[derive(Deserialize)]
struct ListParams {
    /// Comma-separated tags.
    tags: Option<String>,
    /// Comma-separated channels.
    channels: Option<String>,
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    no_tags: bool,
    #[serde(default)]
    sort: SortOrder,
}

fn split_list(value: Option<&str>) -> Option<Vec<String>> {
    value.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// List entry; the transcript is left out.
#[derive(Serialize)]
struct VideoSummary {
    video_id: String,
    title: String,
    display_title: String,
    channel: String,
    duration_seconds: i64,
    tags: Vec<String>,
    processed_at: DateTime<Utc>,
    has_transcript: bool,
}

impl From<Video> for VideoSummary {
    fn from(v: Video) -> Self {
        Self {
            display_title: query::display_title(&v.title),
            has_transcript: v.transcript_text().is_some(),
            video_id: v.video_id,
            title: v.title,
            channel: v.channel,
            duration_seconds: v.duration_seconds,
            tags: v.tags,
            processed_at: v.processed_at,
        }
    }
}

#[derive(Serialize)]
struct VideoListResponse {
    videos: Vec<VideoSummary>,
}

async fn handle_list_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<VideoListResponse>> {
    let session = state.authenticate(&headers)?;
    let filter = VideoFilter {
        tags: split_list(params.tags.as_deref()),
        channels: split_list(params.channels.as_deref()),
        date_range: DateRange::parse(params.from.as_deref(), params.to.as_deref())?,
        no_tags_only: params.no_tags,
    };
    let videos = query::list_videos(state.store.as_ref(), &session, &filter, params.sort).await?;
    Ok(Json(VideoListResponse {
        videos: videos.into_iter().map(VideoSummary::from).collect(),
    }))
}

async fn handle_get_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Video>> {
    let session = state.authenticate(&headers)?;
    let video = state
        .store
        .find_by_video_id(&video_id)
        .await?
        .filter(|v| v.is_owned_by(&session.user_id))
        .ok_or(Error::VideoNotFound(video_id))?;
    Ok(Json(video))
}

#[derive(Deserialize)]
struct TagRequest {
    tag: String,
}

#[derive(Serialize)]
struct TagsResponse {
    video_id: String,
    tags: Vec<String>,
}

async fn handle_add_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
    Json(req): Json<TagRequest>,
) -> ApiResult<Json<TagsResponse>> {
    let session = state.authenticate(&headers)?;
    let tags = state.facets.add_tag(&session, &video_id, &req.tag).await?;
    Ok(Json(TagsResponse { video_id, tags }))
}

async fn handle_remove_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
    Json(req): Json<TagRequest>,
) -> ApiResult<Json<TagsResponse>> {
    let session = state.authenticate(&headers)?;
    state.facets.remove_tag(&session, &video_id, &req.tag).await?;
    let tags = state
        .store
        .find_by_video_id(&video_id)
        .await?
        .map(|v| v.tags)
        .unwrap_or_default();
    Ok(Json(TagsResponse { video_id, tags }))
}

// ============ facets ============

#[derive(Serialize)]
struct TagListResponse {
    tags: Vec<String>,
}

async fn handle_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TagListResponse>> {
    state.authenticate(&headers)?;
    Ok(Json(TagListResponse {
        tags: state.facets.distinct_tags().await?,
    }))
}

#[derive(Serialize)]
struct ChannelListResponse {
    channels: Vec<String>,
}

async fn handle_channels(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ChannelListResponse>> {
    let session = state.authenticate(&headers)?;
    Ok(Json(ChannelListResponse {
        channels: state.facets.distinct_channels(&session).await?,
    }))
}

// ============ /ask ============

#[derive(Deserialize)]
struct AskVideoRequest {
    video_id: String,
    question: String,
}

async fn handle_ask_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AskVideoRequest>,
) -> ApiResult<Json<QaAnswer>> {
    let session = state.authenticate(&headers)?;
    let answer = state
        .qa
        .ask_video(&session, &req.video_id, &req.question)
        .await?;
    Ok(Json(answer))
}

#[derive(Deserialize)]
struct AskTagsRequest {
    tags: Vec<String>,
    question: String,
}

async fn handle_ask_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AskTagsRequest>,
) -> ApiResult<Json<QaAnswer>> {
    let session = state.authenticate(&headers)?;
    let answer = state.qa.ask_by_tags(&session, &req.tags, &req.question).await?;
    Ok(Json(answer))
}

// ============ POST /feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    feedback: String,
}

async fn handle_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<(StatusCode, Json<Feedback>)> {
    let session = state.authenticate(&headers)?;
    let saved = feedback::save(&state.pool, &session.user_id, &req.feedback).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(Error::TagLimitExceeded { limit: 3 }).status,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(Error::TagAlreadyExists("a".into())).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(Error::SessionExpired).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(Error::Fetch("down".into())).status,
            StatusCode::BAD_GATEWAY
        );
        let internal = AppError::from(Error::Storage(sqlx::Error::PoolClosed));
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "internal error");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(Some("rust, ml,,")),
            Some(vec!["rust".to_string(), "ml".to_string()])
        );
        assert_eq!(split_list(None), None);
    }
}
