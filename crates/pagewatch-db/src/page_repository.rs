use chrono::{DateTime, Utc};
use pagewatch_core::error::AppError;
use pagewatch_core::models::MonitoredPage;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Repository for the page-monitoring registry.
#[derive(Clone)]
pub struct PageRepository {
    pool: Pool<Postgres>,
}

impl PageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a page to the registry. Adding a name that already exists updates
    /// the URL and frequency and reactivates the page.
    pub async fn add_page(
        &self,
        page_name: &str,
        page_url: &str,
        crawl_frequency_minutes: u32,
    ) -> Result<MonitoredPage, AppError> {
        let row = sqlx::query_as::<_, PageRow>(
            r#"
            INSERT INTO pages (page_name, page_url, crawl_frequency_minutes)
            VALUES ($1, $2, $3)
            ON CONFLICT (page_name) DO UPDATE SET
                page_url = EXCLUDED.page_url,
                crawl_frequency_minutes = EXCLUDED.crawl_frequency_minutes,
                is_active = TRUE
            RETURNING id, page_name, page_url, is_active,
                      crawl_frequency_minutes, last_crawled_at
            "#,
        )
        .bind(page_name)
        .bind(page_url)
        .bind(crawl_frequency_minutes as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn list_pages(&self) -> Result<Vec<MonitoredPage>, AppError> {
        let rows = sqlx::query_as::<_, PageRow>(
            r#"
            SELECT id, page_name, page_url, is_active,
                   crawl_frequency_minutes, last_crawled_at
            FROM pages
            ORDER BY page_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Soft-remove: history stays attributable, the scheduler skips it.
    pub async fn deactivate_page(&self, page_name: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE pages SET is_active = FALSE WHERE page_name = $1")
            .bind(page_name)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn active_pages(&self) -> Result<Vec<MonitoredPage>, AppError> {
        let rows = sqlx::query_as::<_, PageRow>(
            r#"
            SELECT id, page_name, page_url, is_active,
                   crawl_frequency_minutes, last_crawled_at
            FROM pages
            WHERE is_active
            ORDER BY page_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Stamp `last_crawled_at` after a crawl attempt, success or not.
    pub async fn touch_crawled(&self, page_name: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE pages SET last_crawled_at = now() WHERE page_name = $1")
            .bind(page_name)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct PageRow {
    id: Uuid,
    page_name: String,
    page_url: String,
    is_active: bool,
    crawl_frequency_minutes: i32,
    last_crawled_at: Option<DateTime<Utc>>,
}

impl From<PageRow> for MonitoredPage {
    fn from(row: PageRow) -> Self {
        MonitoredPage {
            id: row.id,
            page_name: row.page_name,
            page_url: row.page_url,
            is_active: row.is_active,
            crawl_frequency_minutes: row.crawl_frequency_minutes as u32,
            last_crawled_at: row.last_crawled_at,
        }
    }
}

// -- Trait implementation --

impl pagewatch_core::traits::PageRegistry for PageRepository {
    async fn add_page(
        &self,
        page_name: &str,
        page_url: &str,
        crawl_frequency_minutes: u32,
    ) -> Result<MonitoredPage, AppError> {
        PageRepository::add_page(self, page_name, page_url, crawl_frequency_minutes).await
    }

    async fn list_pages(&self) -> Result<Vec<MonitoredPage>, AppError> {
        PageRepository::list_pages(self).await
    }

    async fn deactivate_page(&self, page_name: &str) -> Result<(), AppError> {
        PageRepository::deactivate_page(self, page_name).await
    }

    async fn active_pages(&self) -> Result<Vec<MonitoredPage>, AppError> {
        PageRepository::active_pages(self).await
    }

    async fn touch_crawled(&self, page_name: &str) -> Result<(), AppError> {
        PageRepository::touch_crawled(self, page_name).await
    }
}
