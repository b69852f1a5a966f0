use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pagewatch_core::models::PostFilter;

use crate::dto::{
    HealthResponse, PageListResponse, PageResponse, PostListResponse, PostResponse, PostsQuery,
    SessionListResponse, SessionResponse, SessionsQuery, StatsResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/posts", get(list_posts))
        .route("/v1/posts/stats", get(post_stats))
        .route("/v1/sessions", get(list_sessions))
        .route("/v1/pages", get(list_pages));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/posts",
    params(PostsQuery),
    responses(
        (status = 200, description = "Recent posts, newest first", body = PostListResponse),
        (status = 500, description = "Store failure", body = crate::dto::ErrorResponse),
    ),
    tag = "posts"
)]
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = PostFilter {
        page_name: query.page,
        since: query.since,
        until: query.until,
        search: query.search,
        limit: query.limit.unwrap_or(20).min(100),
    };

    let posts = state.db.post_repo().recent_posts(&filter).await?;
    let total = posts.len();

    let response = PostListResponse {
        posts: posts.into_iter().map(PostResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/posts/stats",
    responses(
        (status = 200, description = "Store-wide counters", body = StatsResponse),
        (status = 500, description = "Store failure", body = crate::dto::ErrorResponse),
    ),
    tag = "posts"
)]
pub async fn post_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.db.post_repo().stats().await?;
    Ok(axum::Json(StatsResponse::from(stats)))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/sessions",
    params(SessionsQuery),
    responses(
        (status = 200, description = "Recent crawl sessions, newest first", body = SessionListResponse),
        (status = 500, description = "Store failure", body = crate::dto::ErrorResponse),
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(10).min(100);
    let sessions = state.db.post_repo().recent_sessions(limit).await?;
    let total = sessions.len();

    let response = SessionListResponse {
        sessions: sessions.into_iter().map(SessionResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/pages",
    responses(
        (status = 200, description = "All registered pages, active and inactive", body = PageListResponse),
        (status = 500, description = "Store failure", body = crate::dto::ErrorResponse),
    ),
    tag = "pages"
)]
pub async fn list_pages(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let pages = state.db.page_repo().list_pages().await?;
    let total = pages.len();

    let response = PageListResponse {
        pages: pages.into_iter().map(PageResponse::from).collect(),
        total,
    };

    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match state.db.post_repo().health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, axum::Json(response))
}
