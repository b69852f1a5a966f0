use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// SQL migration statements, executed one at a time.
const MIGRATIONS: &[&str] = &[
    // 0001_create_posts.sql
    r#"CREATE TABLE IF NOT EXISTS posts (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        page_name VARCHAR(255) NOT NULL,
        post_id VARCHAR(255) NOT NULL,
        content TEXT,
        media_urls JSONB NOT NULL DEFAULT '[]',
        posted_at TIMESTAMPTZ,
        likes_count BIGINT NOT NULL DEFAULT 0,
        comments_count BIGINT NOT NULL DEFAULT 0,
        shares_count BIGINT NOT NULL DEFAULT 0,
        post_url TEXT,
        crawled_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (page_name, post_id)
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_posts_page_name ON posts (page_name)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_posts_posted_at ON posts (posted_at DESC)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_posts_crawled_at ON posts (crawled_at DESC)"#,
    // 0002_create_crawl_sessions.sql
    r#"CREATE TABLE IF NOT EXISTS crawl_sessions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        page_name VARCHAR(255) NOT NULL,
        started_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        finished_at TIMESTAMPTZ,
        posts_found INTEGER NOT NULL DEFAULT 0,
        posts_new INTEGER NOT NULL DEFAULT 0,
        posts_updated INTEGER NOT NULL DEFAULT 0,
        status VARCHAR(16) NOT NULL DEFAULT 'running'
            CHECK (status IN ('running', 'completed', 'failed')),
        error_message TEXT
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_page_name ON crawl_sessions (page_name)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON crawl_sessions (started_at DESC)"#,
    // 0003_create_pages.sql
    r#"CREATE TABLE IF NOT EXISTS pages (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        page_name VARCHAR(255) NOT NULL UNIQUE,
        page_url TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        crawl_frequency_minutes INTEGER NOT NULL DEFAULT 60,
        last_crawled_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_pages_active ON pages (is_active)"#,
];

/// Spins up a PostgreSQL container and returns a connected pool.
///
/// The `ContainerAsync` must be kept in scope for the test duration;
/// dropping it stops the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "pagewatch_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string =
        format!("postgresql://postgres:postgres@{host}:{port}/pagewatch_test");

    // Retry connection until container is fully ready
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    // Run migrations one statement at a time
    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    (pool, container)
}
