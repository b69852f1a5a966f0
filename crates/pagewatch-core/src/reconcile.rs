use std::collections::HashMap;

use chrono::Utc;

use crate::error::AppError;
use crate::models::{Post, StoredPost};
use crate::traits::PostStore;

/// Result of comparing a candidate batch against the store.
///
/// Classification only; nothing here touches storage beyond lookups. The
/// caller hands the outcome to [`PostStore::persist_batch`] so all writes
/// happen inside one transaction.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Candidates with no stored counterpart.
    pub to_insert: Vec<Post>,
    /// Merged records: existing surrogate id and `crawled_at`, candidate
    /// content fields, fresh `updated_at`.
    pub to_update: Vec<StoredPost>,
    /// Candidates equal to their stored counterpart on every comparable field.
    pub unchanged: usize,
    /// In-batch duplicate identities (same `post_id` seen more than once in a
    /// single crawl). Resolved last-seen-wins; surfaced as a data-quality
    /// signal because fallback fingerprint ids can collide.
    pub collisions: usize,
}

impl ReconcileOutcome {
    /// Unique candidates in the batch: insert + update + unchanged.
    pub fn found(&self) -> u32 {
        (self.to_insert.len() + self.to_update.len() + self.unchanged) as u32
    }
}

/// Compare a candidate batch against the store and classify each unique
/// candidate as insert, update, or unchanged.
///
/// Duplicate `post_id`s within the batch collapse to the last-seen
/// occurrence (a later parse of the same element supersedes an earlier
/// partial one) and count once in `found`. A store lookup failure aborts the
/// whole reconciliation; partial classification is never returned.
pub async fn reconcile<S: PostStore>(
    store: &S,
    page_name: &str,
    candidates: Vec<Post>,
) -> Result<ReconcileOutcome, AppError> {
    let mut outcome = ReconcileOutcome::default();

    // Collapse in-batch duplicates, preserving first-seen document order.
    let mut order: Vec<Post> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for candidate in candidates {
        match index.get(&candidate.post_id) {
            Some(&pos) => {
                tracing::debug!(
                    page = page_name,
                    post_id = %candidate.post_id,
                    "Duplicate identity within batch, keeping last occurrence"
                );
                order[pos] = candidate;
                outcome.collisions += 1;
            }
            None => {
                index.insert(candidate.post_id.clone(), order.len());
                order.push(candidate);
            }
        }
    }

    for candidate in order {
        let existing = store.find_post(page_name, &candidate.post_id).await?;

        match existing {
            None => outcome.to_insert.push(candidate),
            Some(stored) if stored.post.content_differs(&candidate) => {
                let merged = StoredPost {
                    id: stored.id,
                    post: Post {
                        crawled_at: stored.post.crawled_at,
                        updated_at: Utc::now(),
                        ..candidate
                    },
                };
                outcome.to_update.push(merged);
            }
            Some(_) => outcome.unchanged += 1,
        }
    }

    Ok(outcome)
}
