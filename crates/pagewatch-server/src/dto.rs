use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pagewatch_core::models::{CrawlSession, MonitoredPage, StoreStats, StoredPost};

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PostsQuery {
    /// Restrict to a single monitored page
    pub page: Option<String>,
    /// Only posts published at or after this instant (RFC 3339)
    pub since: Option<DateTime<Utc>>,
    /// Only posts published at or before this instant (RFC 3339)
    pub until: Option<DateTime<Utc>>,
    /// Case-insensitive substring match over post content
    pub search: Option<String>,
    /// Maximum rows to return (default 20, capped at 100)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PostResponse {
    pub id: Uuid,
    pub page_name: String,
    pub post_id: String,
    pub content: Option<String>,
    pub media_urls: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub post_url: Option<String>,
    pub crawled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredPost> for PostResponse {
    fn from(stored: StoredPost) -> Self {
        let post = stored.post;
        Self {
            id: stored.id,
            page_name: post.page_name,
            post_id: post.post_id,
            content: post.content,
            media_urls: post.media_urls,
            posted_at: post.posted_at,
            likes: post.engagement.likes,
            comments: post.engagement.comments,
            shares: post.engagement.shares,
            post_url: post.post_url,
            crawled_at: post.crawled_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub total_posts: i64,
    pub pages_monitored: i64,
    pub posts_last_24h: i64,
    pub last_crawl: Option<DateTime<Utc>>,
}

impl From<StoreStats> for StatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            total_posts: stats.total_posts,
            pages_monitored: stats.pages_monitored,
            posts_last_24h: stats.posts_last_24h,
            last_crawl: stats.last_crawl,
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SessionsQuery {
    /// Maximum rows to return (default 10, capped at 100)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub page_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub posts_found: u32,
    pub posts_new: u32,
    pub posts_updated: u32,
    pub status: String,
    pub error_message: Option<String>,
}

impl From<CrawlSession> for SessionResponse {
    fn from(session: CrawlSession) -> Self {
        Self {
            id: session.id,
            page_name: session.page_name,
            started_at: session.started_at,
            finished_at: session.finished_at,
            posts_found: session.posts_found,
            posts_new: session.posts_new,
            posts_updated: session.posts_updated,
            status: session.status.to_string(),
            error_message: session.error_message,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PageResponse {
    pub id: Uuid,
    pub page_name: String,
    pub page_url: String,
    pub is_active: bool,
    pub crawl_frequency_minutes: u32,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

impl From<MonitoredPage> for PageResponse {
    fn from(page: MonitoredPage) -> Self {
        Self {
            id: page.id,
            page_name: page.page_name,
            page_url: page.page_url,
            is_active: page.is_active,
            crawl_frequency_minutes: page.crawl_frequency_minutes,
            last_crawled_at: page.last_crawled_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PageListResponse {
    pub pages: Vec<PageResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
