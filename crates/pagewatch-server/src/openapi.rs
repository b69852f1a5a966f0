use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pagewatch API",
        version = "0.1.0",
        description = "Read-only dashboard over crawled Facebook page posts."
    ),
    paths(
        crate::routes::list_posts,
        crate::routes::post_stats,
        crate::routes::list_sessions,
        crate::routes::list_pages,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::PostResponse,
        crate::dto::PostListResponse,
        crate::dto::StatsResponse,
        crate::dto::SessionResponse,
        crate::dto::SessionListResponse,
        crate::dto::PageResponse,
        crate::dto::PageListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "posts", description = "Crawled post history"),
        (name = "sessions", description = "Crawl session accounting"),
        (name = "pages", description = "Monitored page registry"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
