use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use pagewatch_db::Database;
use pagewatch_server::routes;
use pagewatch_server::state::AppState;

const MIGRATIONS: &[&str] = &[
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
    r#"CREATE TABLE IF NOT EXISTS pages (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        page_name VARCHAR(255) NOT NULL UNIQUE,
        page_url TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        crawl_frequency_minutes INTEGER NOT NULL DEFAULT 60,
        last_crawled_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
];

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    _container: ContainerAsync<GenericImage>,
}

/// Spin up a PostgreSQL container and return the router plus a database
/// handle for seeding fixtures.
pub async fn setup_test_app() -> TestApp {
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

    let url = format!("postgresql://postgres:postgres@{host}:{port}/pagewatch_test");
    let pool = retry_connect(&url).await;

    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    let db = Database::from_pool(pool);
    let state = Arc::new(AppState { db: db.clone() });

    TestApp {
        router: routes::router(state),
        db,
        _container: container,
    }
}

async fn retry_connect(url: &str) -> PgPool {
    for _ in 0..30 {
        if let Ok(pool) = PgPoolOptions::new().max_connections(5).connect(url).await {
            return pool;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test database");
}
