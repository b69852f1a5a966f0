use chrono::{DateTime, Utc};
use pagewatch_core::error::AppError;
use pagewatch_core::models::{
    CrawlSession, Post, PostFilter, SessionHandle, SessionStatus, StoredPost, StoreStats,
};
use pagewatch_core::reconcile::ReconcileOutcome;
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Repository for post and crawl-session persistence in PostgreSQL.
#[derive(Clone)]
pub struct PostRepository {
    pool: Pool<Postgres>,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a post by its logical identity.
    pub async fn find_post(
        &self,
        page_name: &str,
        post_id: &str,
    ) -> Result<Option<StoredPost>, AppError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, page_name, post_id, content, media_urls, posted_at,
                   likes_count, comments_count, shares_count, post_url,
                   crawled_at, updated_at
            FROM posts
            WHERE page_name = $1 AND post_id = $2
            "#,
        )
        .bind(page_name)
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Insert or update a single post. The conflict update deliberately
    /// leaves `crawled_at` out of the SET list so the first-seen timestamp
    /// survives re-crawls.
    pub async fn upsert_post(&self, post: &Post) -> Result<Uuid, AppError> {
        upsert_on(&self.pool, post).await
    }

    /// Apply a reconciled batch inside one transaction.
    pub async fn persist_batch(&self, outcome: &ReconcileOutcome) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        for post in &outcome.to_insert {
            upsert_on(&mut *tx, post).await?;
        }
        for stored in &outcome.to_update {
            let media_urls = serde_json::to_value(&stored.post.media_urls)?;
            sqlx::query(
                r#"
                UPDATE posts
                SET content = $2, media_urls = $3, posted_at = $4,
                    likes_count = $5, comments_count = $6, shares_count = $7,
                    post_url = $8, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(stored.id)
            .bind(&stored.post.content)
            .bind(media_urls)
            .bind(stored.post.posted_at)
            .bind(stored.post.engagement.likes)
            .bind(stored.post.engagement.comments)
            .bind(stored.post.engagement.shares)
            .bind(&stored.post.post_url)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tracing::debug!(
            inserted = outcome.to_insert.len(),
            updated = outcome.to_update.len(),
            "Persisted reconciled batch"
        );
        Ok(())
    }

    /// Open a `running` session row and return its handle.
    pub async fn begin_session(&self, page_name: &str) -> Result<SessionHandle, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO crawl_sessions (page_name)
            VALUES ($1)
            RETURNING id
            "#,
        )
        .bind(page_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(SessionHandle {
            id: row.0,
            page_name: page_name.to_string(),
        })
    }

    /// Apply the single terminal transition. The `status = 'running'` guard
    /// makes a second write miss, which surfaces as [`AppError::SessionMisuse`].
    pub async fn finalize_session(
        &self,
        handle: SessionHandle,
        status: SessionStatus,
        found: u32,
        new: u32,
        updated: u32,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE crawl_sessions
            SET status = $2, finished_at = now(),
                posts_found = $3, posts_new = $4, posts_updated = $5,
                error_message = $6
            WHERE id = $1 AND status = 'running'
            RETURNING id
            "#,
        )
        .bind(handle.id)
        .bind(status.as_str())
        .bind(found as i32)
        .bind(new as i32)
        .bind(updated as i32)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        match row {
            Some(_) => Ok(()),
            None => Err(AppError::SessionMisuse(format!(
                "no running session with id {} to finalize",
                handle.id
            ))),
        }
    }

    /// Posts matching the filter, newest first.
    pub async fn recent_posts(&self, filter: &PostFilter) -> Result<Vec<StoredPost>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT id, page_name, post_id, content, media_urls, posted_at, \
             likes_count, comments_count, shares_count, post_url, \
             crawled_at, updated_at FROM posts WHERE 1=1",
        );
        if let Some(page_name) = &filter.page_name {
            query.push(" AND page_name = ").push_bind(page_name.clone());
        }
        if let Some(since) = filter.since {
            query.push(" AND posted_at >= ").push_bind(since);
        }
        if let Some(until) = filter.until {
            query.push(" AND posted_at <= ").push_bind(until);
        }
        if let Some(search) = &filter.search {
            query
                .push(" AND content ILIKE ")
                .push_bind(format!("%{search}%"));
        }
        query
            .push(" ORDER BY posted_at DESC NULLS LAST, crawled_at DESC LIMIT ")
            .push_bind(filter.limit.max(1) as i64);

        let rows: Vec<PostRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Recent crawl sessions, newest first.
    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<CrawlSession>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, page_name, started_at, finished_at,
                   posts_found, posts_new, posts_updated, status, error_message
            FROM crawl_sessions
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Overview counters for the dashboard.
    pub async fn stats(&self) -> Result<StoreStats, AppError> {
        let row: (i64, i64, i64, Option<DateTime<Utc>>) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM posts),
                (SELECT COUNT(DISTINCT page_name) FROM posts),
                (SELECT COUNT(*) FROM posts WHERE crawled_at > now() - interval '24 hours'),
                (SELECT MAX(started_at) FROM crawl_sessions)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(StoreStats {
            total_posts: row.0,
            pages_monitored: row.1,
            posts_last_24h: row.2,
            last_crawl: row.3,
        })
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

async fn upsert_on<'e, E>(executor: E, post: &Post) -> Result<Uuid, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let media_urls = serde_json::to_value(&post.media_urls)?;
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO posts (page_name, post_id, content, media_urls, posted_at,
                           likes_count, comments_count, shares_count, post_url,
                           crawled_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
        ON CONFLICT (page_name, post_id) DO UPDATE SET
            content = EXCLUDED.content,
            media_urls = EXCLUDED.media_urls,
            posted_at = EXCLUDED.posted_at,
            likes_count = EXCLUDED.likes_count,
            comments_count = EXCLUDED.comments_count,
            shares_count = EXCLUDED.shares_count,
            post_url = EXCLUDED.post_url,
            updated_at = now()
        RETURNING id
        "#,
    )
    .bind(&post.page_name)
    .bind(&post.post_id)
    .bind(&post.content)
    .bind(media_urls)
    .bind(post.posted_at)
    .bind(post.engagement.likes)
    .bind(post.engagement.comments)
    .bind(post.engagement.shares)
    .bind(&post.post_url)
    .bind(post.crawled_at)
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::DatabaseError(e.to_string()))?;

    Ok(row.0)
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    page_name: String,
    post_id: String,
    content: Option<String>,
    media_urls: serde_json::Value,
    posted_at: Option<DateTime<Utc>>,
    likes_count: i64,
    comments_count: i64,
    shares_count: i64,
    post_url: Option<String>,
    crawled_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for StoredPost {
    fn from(row: PostRow) -> Self {
        StoredPost {
            id: row.id,
            post: Post {
                page_name: row.page_name,
                post_id: row.post_id,
                content: row.content,
                media_urls: serde_json::from_value(row.media_urls).unwrap_or_default(),
                posted_at: row.posted_at,
                engagement: pagewatch_core::models::Engagement {
                    likes: row.likes_count,
                    comments: row.comments_count,
                    shares: row.shares_count,
                },
                post_url: row.post_url,
                crawled_at: row.crawled_at,
                updated_at: row.updated_at,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    page_name: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    posts_found: i32,
    posts_new: i32,
    posts_updated: i32,
    status: String,
    error_message: Option<String>,
}

impl TryFrom<SessionRow> for CrawlSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, AppError> {
        let status = row
            .status
            .parse::<SessionStatus>()
            .map_err(AppError::DatabaseError)?;
        Ok(CrawlSession {
            id: row.id,
            page_name: row.page_name,
            started_at: row.started_at,
            finished_at: row.finished_at,
            posts_found: row.posts_found as u32,
            posts_new: row.posts_new as u32,
            posts_updated: row.posts_updated as u32,
            status,
            error_message: row.error_message,
        })
    }
}

// -- Trait implementation --

impl pagewatch_core::traits::PostStore for PostRepository {
    async fn find_post(
        &self,
        page_name: &str,
        post_id: &str,
    ) -> Result<Option<StoredPost>, AppError> {
        PostRepository::find_post(self, page_name, post_id).await
    }

    async fn upsert_post(&self, post: &Post) -> Result<Uuid, AppError> {
        PostRepository::upsert_post(self, post).await
    }

    async fn persist_batch(&self, outcome: &ReconcileOutcome) -> Result<(), AppError> {
        PostRepository::persist_batch(self, outcome).await
    }

    async fn begin_session(&self, page_name: &str) -> Result<SessionHandle, AppError> {
        PostRepository::begin_session(self, page_name).await
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
        PostRepository::finalize_session(self, handle, status, found, new, updated, error_message)
            .await
    }

    async fn recent_posts(&self, filter: &PostFilter) -> Result<Vec<StoredPost>, AppError> {
        PostRepository::recent_posts(self, filter).await
    }

    async fn recent_sessions(&self, limit: usize) -> Result<Vec<CrawlSession>, AppError> {
        PostRepository::recent_sessions(self, limit).await
    }

    async fn stats(&self) -> Result<StoreStats, AppError> {
        PostRepository::stats(self).await
    }
}
