use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CrawlSession, MonitoredPage, Post, PostFilter, SessionHandle, SessionStatus, StoredPost,
    StoreStats,
};
use crate::reconcile::ReconcileOutcome;

/// Fetches rendered page markup for a URL.
///
/// Implementations own the rendering strategy (headless browser with
/// scrolling, plain HTTP against the mobile site) and any cookie handling;
/// the core only sees the resulting HTML string.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns raw page markup into candidate posts.
///
/// Pure function of its input: no network, no storage. Zero candidates is a
/// valid outcome (quiet page); markup that is not a timeline at all (login
/// wall, empty document) is an [`AppError::ExtractionError`].
pub trait Extractor: Send + Sync + Clone {
    fn extract(&self, page_name: &str, raw_markup: &str) -> Result<Vec<Post>, AppError>;
}

/// Persists and retrieves posts and crawl sessions.
pub trait PostStore: Send + Sync + Clone {
    /// Look up a post by its logical identity.
    fn find_post(
        &self,
        page_name: &str,
        post_id: &str,
    ) -> impl Future<Output = Result<Option<StoredPost>, AppError>> + Send;

    /// Insert or update a single post. Insert assigns the surrogate id;
    /// update preserves it along with the original `crawled_at`.
    fn upsert_post(&self, post: &Post) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Apply a reconciled batch. Atomic: either every insert and update in
    /// the outcome lands, or none of them do.
    fn persist_batch(
        &self,
        outcome: &ReconcileOutcome,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Open a `running` session row. Committed immediately, before
    /// extraction starts, so a crash mid-crawl leaves an auditable row.
    fn begin_session(
        &self,
        page_name: &str,
    ) -> impl Future<Output = Result<SessionHandle, AppError>> + Send;

    /// Record the single terminal transition for a session.
    ///
    /// Returns [`AppError::SessionMisuse`] if the handle is unknown or the
    /// session already reached a terminal state.
    fn finalize_session(
        &self,
        handle: SessionHandle,
        status: SessionStatus,
        found: u32,
        new: u32,
        updated: u32,
        error_message: Option<&str>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Dashboard read: posts matching the filter, newest `posted_at` first.
    fn recent_posts(
        &self,
        filter: &PostFilter,
    ) -> impl Future<Output = Result<Vec<StoredPost>, AppError>> + Send;

    /// Dashboard read: recent crawl sessions, newest first.
    fn recent_sessions(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<CrawlSession>, AppError>> + Send;

    /// Dashboard read: overview counters.
    fn stats(&self) -> impl Future<Output = Result<StoreStats, AppError>> + Send;
}

/// Registry of pages to monitor, consumed by the scheduler and CLI.
pub trait PageRegistry: Send + Sync + Clone {
    /// Add a page, or reactivate and update it if the name already exists.
    fn add_page(
        &self,
        page_name: &str,
        page_url: &str,
        crawl_frequency_minutes: u32,
    ) -> impl Future<Output = Result<MonitoredPage, AppError>> + Send;

    fn list_pages(&self) -> impl Future<Output = Result<Vec<MonitoredPage>, AppError>> + Send;

    /// Soft-remove: the row stays for history, the scheduler skips it.
    fn deactivate_page(&self, page_name: &str)
    -> impl Future<Output = Result<(), AppError>> + Send;

    fn active_pages(&self) -> impl Future<Output = Result<Vec<MonitoredPage>, AppError>> + Send;

    /// Stamp `last_crawled_at` after a crawl attempt, success or not.
    fn touch_crawled(&self, page_name: &str)
    -> impl Future<Output = Result<(), AppError>> + Send;
}
