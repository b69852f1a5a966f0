//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CrawlSession, MonitoredPage, Post, PostFilter, SessionHandle, SessionStatus, StoredPost,
    StoreStats,
};
use crate::reconcile::ReconcileOutcome;
use crate::traits::{Extractor, Fetcher, PageRegistry, PostStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(html.to_string())])),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns configurable candidate batches.
#[derive(Clone)]
pub struct MockExtractor {
    batches: Arc<Mutex<Vec<Result<Vec<Post>, AppError>>>>,
    /// Batch returned when the queue is exhausted (or on every call for
    /// [`MockExtractor::repeating`]).
    fallback: Arc<Vec<Post>>,
}

impl MockExtractor {
    pub fn new(batch: Vec<Post>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(vec![Ok(batch)])),
            fallback: Arc::new(Vec::new()),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            batches: Arc::new(Mutex::new(vec![Err(error)])),
            fallback: Arc::new(Vec::new()),
        }
    }

    pub fn with_batches(batches: Vec<Vec<Post>>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(batches.into_iter().map(Ok).collect())),
            fallback: Arc::new(Vec::new()),
        }
    }

    /// Returns the same batch on every call.
    pub fn repeating(batch: Vec<Post>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            fallback: Arc::new(batch),
        }
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, page_name: &str, _raw_markup: &str) -> Result<Vec<Post>, AppError> {
        let mut batches = self.batches.lock().unwrap();
        let batch = if batches.is_empty() {
            Ok(self.fallback.as_ref().clone())
        } else {
            batches.remove(0)
        };
        // Candidates belong to the page being crawled.
        batch.map(|posts| {
            posts
                .into_iter()
                .map(|mut p| {
                    p.page_name = page_name.to_string();
                    p
                })
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store mirroring the PostgreSQL repository semantics.
#[derive(Clone)]
pub struct MockStore {
    posts: Arc<Mutex<HashMap<(String, String), StoredPost>>>,
    sessions: Arc<Mutex<Vec<CrawlSession>>>,
    find_error: Arc<Mutex<Option<AppError>>>,
    persist_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self {
            posts: Arc::new(Mutex::new(HashMap::new())),
            sessions: Arc::new(Mutex::new(Vec::new())),
            find_error: Arc::new(Mutex::new(None)),
            persist_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_find_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.find_error.lock().unwrap() = Some(error);
        store
    }

    pub fn with_persist_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.persist_error.lock().unwrap() = Some(error);
        store
    }

    /// Seed a post as if it had been stored by an earlier crawl.
    pub async fn seed(&self, post: Post) {
        let key = (post.page_name.clone(), post.post_id.clone());
        self.posts.lock().unwrap().insert(
            key,
            StoredPost {
                id: Uuid::new_v4(),
                post,
            },
        );
    }
}

impl PostStore for MockStore {
    async fn find_post(
        &self,
        page_name: &str,
        post_id: &str,
    ) -> Result<Option<StoredPost>, AppError> {
        if let Some(e) = self.find_error.lock().unwrap().take() {
            return Err(e);
        }
        let key = (page_name.to_string(), post_id.to_string());
        Ok(self.posts.lock().unwrap().get(&key).cloned())
    }

    async fn upsert_post(&self, post: &Post) -> Result<Uuid, AppError> {
        let key = (post.page_name.clone(), post.post_id.clone());
        let mut posts = self.posts.lock().unwrap();
        match posts.get_mut(&key) {
            Some(existing) => {
                let crawled_at = existing.post.crawled_at;
                existing.post = post.clone();
                existing.post.crawled_at = crawled_at;
                existing.post.updated_at = Utc::now();
                Ok(existing.id)
            }
            None => {
                let id = Uuid::new_v4();
                posts.insert(
                    key,
                    StoredPost {
                        id,
                        post: post.clone(),
                    },
                );
                Ok(id)
            }
        }
    }

    async fn persist_batch(&self, outcome: &ReconcileOutcome) -> Result<(), AppError> {
        if let Some(e) = self.persist_error.lock().unwrap().take() {
            return Err(e);
        }
        for post in &outcome.to_insert {
            self.upsert_post(post).await?;
        }
        for stored in &outcome.to_update {
            self.upsert_post(&stored.post).await?;
        }
        Ok(())
    }

    async fn begin_session(&self, page_name: &str) -> Result<SessionHandle, AppError> {
        let session = CrawlSession {
            id: Uuid::new_v4(),
            page_name: page_name.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            posts_found: 0,
            posts_new: 0,
            posts_updated: 0,
            status: SessionStatus::Running,
            error_message: None,
        };
        let handle = SessionHandle {
            id: session.id,
            page_name: session.page_name.clone(),
        };
        self.sessions.lock().unwrap().push(session);
        Ok(handle)
    }

    async fn finalize_session(
        &self,
        handle: SessionHandle,
        status: SessionStatus,
        found: u32,
        new: u32,
        updated: u32,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == handle.id && s.status == SessionStatus::Running)
            .ok_or_else(|| {
                AppError::SessionMisuse(format!(
                    "no running session with id {} to finalize",
                    handle.id
                ))
            })?;
        session.status = status;
        session.finished_at = Some(Utc::now());
        session.posts_found = found;
        session.posts_new = new;
        session.posts_updated = updated;
        session.error_message = error_message.map(str::to_string);
        Ok(())
    }

    async fn recent_posts(&self, filter: &PostFilter) -> Result<Vec<StoredPost>, AppError> {
        let posts = self.posts.lock().unwrap();
        let mut matched: Vec<StoredPost> = posts
            .values()
            .filter(|p| {
                filter
                    .page_name
                    .as_deref()
                    .is_none_or(|name| p.post.page_name == name)
            })
            .filter(|p| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|needle| {
                        p.post
                            .content
                            .as_deref()
                            .is_some_and(|c| c.contains(needle))
                    })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.post.posted_at.cmp(&a.post.posted_at));
        matched.truncate(filter.limit.max(1));
        Ok(matched)
    }

    async fn recent_sessions(&self, limit: usize) -> Result<Vec<CrawlSession>, AppError> {
        let sessions = self.sessions.lock().unwrap();
        let mut out: Vec<CrawlSession> = sessions.iter().cloned().collect();
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn stats(&self) -> Result<StoreStats, AppError> {
        let posts = self.posts.lock().unwrap();
        let pages: std::collections::HashSet<&str> = posts
            .values()
            .map(|p| p.post.page_name.as_str())
            .collect();
        Ok(StoreStats {
            total_posts: posts.len() as i64,
            pages_monitored: pages.len() as i64,
            posts_last_24h: posts
                .values()
                .filter(|p| Utc::now() - p.post.crawled_at < chrono::TimeDelta::hours(24))
                .count() as i64,
            last_crawl: posts.values().map(|p| p.post.crawled_at).max(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockRegistry
// ---------------------------------------------------------------------------

/// In-memory page registry.
#[derive(Clone)]
pub struct MockRegistry {
    pages: Arc<Mutex<Vec<MonitoredPage>>>,
}

impl MockRegistry {
    pub fn empty() -> Self {
        Self {
            pages: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl PageRegistry for MockRegistry {
    async fn add_page(
        &self,
        page_name: &str,
        page_url: &str,
        crawl_frequency_minutes: u32,
    ) -> Result<MonitoredPage, AppError> {
        let mut pages = self.pages.lock().unwrap();
        if let Some(existing) = pages.iter_mut().find(|p| p.page_name == page_name) {
            existing.page_url = page_url.to_string();
            existing.crawl_frequency_minutes = crawl_frequency_minutes;
            existing.is_active = true;
            return Ok(existing.clone());
        }
        let page = MonitoredPage {
            id: Uuid::new_v4(),
            page_name: page_name.to_string(),
            page_url: page_url.to_string(),
            is_active: true,
            crawl_frequency_minutes,
            last_crawled_at: None,
        };
        pages.push(page.clone());
        Ok(page)
    }

    async fn list_pages(&self) -> Result<Vec<MonitoredPage>, AppError> {
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn deactivate_page(&self, page_name: &str) -> Result<(), AppError> {
        let mut pages = self.pages.lock().unwrap();
        if let Some(page) = pages.iter_mut().find(|p| p.page_name == page_name) {
            page.is_active = false;
        }
        Ok(())
    }

    async fn active_pages(&self) -> Result<Vec<MonitoredPage>, AppError> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn touch_crawled(&self, page_name: &str) -> Result<(), AppError> {
        let mut pages = self.pages.lock().unwrap();
        if let Some(page) = pages.iter_mut().find(|p| p.page_name == page_name) {
            page.last_crawled_at = Some(Utc::now());
        }
        Ok(())
    }
}
