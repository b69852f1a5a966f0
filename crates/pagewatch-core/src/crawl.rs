use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::AppError;
use crate::models::Post;
use crate::reconcile::{ReconcileOutcome, reconcile};
use crate::session::SessionAccountant;
use crate::traits::{Extractor, Fetcher, PostStore};

/// Per-page mutual exclusion for the reconcile-and-persist step.
///
/// Two concurrent reconcilers for the same page could both see "not found"
/// for a new identity and double-insert; serializing per `page_name` closes
/// that window while leaving crawls of different pages fully parallel.
#[derive(Clone, Default)]
pub struct PageLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl PageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, page_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(page_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Outcome of one crawl invocation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CrawlReport {
    pub page_name: String,
    pub session_id: Option<Uuid>,
    pub posts_found: u32,
    pub posts_new: u32,
    pub posts_updated: u32,
    pub unchanged: u32,
    /// Extracted candidates. Populated only in no-save mode, where the
    /// caller has no store to read them back from.
    pub posts: Vec<Post>,
}

/// Orchestrates one crawl session: fetch → extract → reconcile → persist →
/// account.
///
/// Generic over all external dependencies via traits, enabling dependency
/// injection and testability without a real browser or database.
#[derive(Clone)]
pub struct CrawlService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: PostStore,
{
    fetcher: F,
    extractor: E,
    store: Option<S>,
    locks: PageLocks,
}

impl<F, E, S> CrawlService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: PostStore,
{
    /// Crawl without persistence: extract and report only.
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self {
            fetcher,
            extractor,
            store: None,
            locks: PageLocks::new(),
        }
    }

    /// Crawl with database persistence and session accounting.
    pub fn with_store(fetcher: F, extractor: E, store: S) -> Self {
        Self {
            fetcher,
            extractor,
            store: Some(store),
            locks: PageLocks::new(),
        }
    }

    /// Run one crawl for a page.
    ///
    /// With a store: opens a `running` session row first, then fetches,
    /// extracts, reconciles, and persists the batch atomically; the session
    /// row gets exactly one terminal write (`completed` with counts, or
    /// `failed` with the error message) regardless of where a failure
    /// surfaced. The returned error is the original pipeline error, not the
    /// bookkeeping result.
    pub async fn run(&self, page_url: &str, page_name: &str) -> Result<CrawlReport, AppError> {
        let Some(store) = &self.store else {
            return self.run_without_store(page_url, page_name).await;
        };

        let lock = self.locks.lock_for(page_name);
        let _guard = lock.lock().await;

        let accountant = SessionAccountant::new(store.clone());
        let handle = accountant.begin(page_name).await?;
        let session_id = handle.id;

        match self.crawl_and_persist(store, page_url, page_name).await {
            Ok(outcome) => {
                let found = outcome.found();
                let new = outcome.to_insert.len() as u32;
                let updated = outcome.to_update.len() as u32;
                let unchanged = outcome.unchanged as u32;

                accountant.complete(handle, found, new, updated).await?;

                Ok(CrawlReport {
                    page_name: page_name.to_string(),
                    session_id: Some(session_id),
                    posts_found: found,
                    posts_new: new,
                    posts_updated: updated,
                    unchanged,
                    posts: Vec::new(),
                })
            }
            Err(err) => {
                if let Err(bookkeeping) = accountant.fail(handle, &err.to_string()).await {
                    tracing::error!(
                        %session_id,
                        error = %bookkeeping,
                        "Failed to record session failure"
                    );
                }
                Err(err)
            }
        }
    }

    async fn crawl_and_persist(
        &self,
        store: &S,
        page_url: &str,
        page_name: &str,
    ) -> Result<ReconcileOutcome, AppError> {
        tracing::info!(page = page_name, url = page_url, "Fetching page");
        let markup = self.fetcher.fetch(page_url).await?;
        tracing::info!(page = page_name, bytes = markup.len(), "Fetched markup");

        let candidates = self.extractor.extract(page_name, &markup)?;
        tracing::info!(page = page_name, candidates = candidates.len(), "Extracted candidates");

        let outcome = reconcile(store, page_name, candidates).await?;
        if outcome.collisions > 0 {
            tracing::warn!(
                page = page_name,
                collisions = outcome.collisions,
                "Duplicate identities collapsed within batch"
            );
        }

        store.persist_batch(&outcome).await?;
        Ok(outcome)
    }

    async fn run_without_store(
        &self,
        page_url: &str,
        page_name: &str,
    ) -> Result<CrawlReport, AppError> {
        tracing::info!(page = page_name, url = page_url, "Fetching page (no-save)");
        let markup = self.fetcher.fetch(page_url).await?;
        let posts = self.extractor.extract(page_name, &markup)?;
        let found = posts.len() as u32;

        Ok(CrawlReport {
            page_name: page_name.to_string(),
            session_id: None,
            posts_found: found,
            posts_new: 0,
            posts_updated: 0,
            unchanged: 0,
            posts,
        })
    }
}
