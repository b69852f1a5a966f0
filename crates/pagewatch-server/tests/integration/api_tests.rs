use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use pagewatch_core::models::{Post, SessionStatus};

use crate::common::setup_test_app;

fn seed_post(page: &str, id: &str, content: &str) -> Post {
    let mut post = Post::candidate(page, id);
    post.content = Some(content.to_string());
    post.engagement.likes = 5;
    post
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = get_json(app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn posts_empty_store_returns_empty_list() {
    let app = setup_test_app().await;

    let (status, json) = get_json(app.router, "/v1/posts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
    assert_eq!(json["posts"], serde_json::json!([]));
}

#[tokio::test]
async fn posts_filter_by_page() {
    let app = setup_test_app().await;
    let repo = app.db.post_repo();

    repo.upsert_post(&seed_post("alpha", "1", "First post"))
        .await
        .unwrap();
    repo.upsert_post(&seed_post("alpha", "2", "Second post"))
        .await
        .unwrap();
    repo.upsert_post(&seed_post("beta", "3", "Other page"))
        .await
        .unwrap();

    let (status, json) = get_json(app.router, "/v1/posts?page=alpha").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    for post in json["posts"].as_array().unwrap() {
        assert_eq!(post["page_name"], "alpha");
    }
}

#[tokio::test]
async fn posts_search_is_case_insensitive() {
    let app = setup_test_app().await;
    let repo = app.db.post_repo();

    repo.upsert_post(&seed_post("alpha", "1", "Rust release announcement"))
        .await
        .unwrap();
    repo.upsert_post(&seed_post("alpha", "2", "Weekend photos"))
        .await
        .unwrap();

    let (status, json) = get_json(app.router, "/v1/posts?search=rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(
        json["posts"][0]["content"],
        "Rust release announcement"
    );
}

#[tokio::test]
async fn posts_limit_is_applied() {
    let app = setup_test_app().await;
    let repo = app.db.post_repo();

    for i in 0..5 {
        repo.upsert_post(&seed_post("alpha", &i.to_string(), "content"))
            .await
            .unwrap();
    }

    let (status, json) = get_json(app.router, "/v1/posts?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
}

#[tokio::test]
async fn posts_rejects_malformed_since() {
    let app = setup_test_app().await;

    let (status, _) = get_json(app.router, "/v1/posts?since=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_reflect_seeded_posts() {
    let app = setup_test_app().await;
    let repo = app.db.post_repo();

    repo.upsert_post(&seed_post("alpha", "1", "one")).await.unwrap();
    repo.upsert_post(&seed_post("beta", "2", "two")).await.unwrap();

    let (status, json) = get_json(app.router, "/v1/posts/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_posts"], 2);
    assert_eq!(json["pages_monitored"], 2);
    assert_eq!(json["posts_last_24h"], 2);
}

#[tokio::test]
async fn sessions_show_finalized_crawl() {
    let app = setup_test_app().await;
    let repo = app.db.post_repo();

    let handle = repo.begin_session("alpha").await.unwrap();
    repo.finalize_session(handle, SessionStatus::Completed, 7, 4, 2, None)
        .await
        .unwrap();

    let (status, json) = get_json(app.router, "/v1/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["sessions"][0]["page_name"], "alpha");
    assert_eq!(json["sessions"][0]["status"], "completed");
    assert_eq!(json["sessions"][0]["posts_found"], 7);
    assert_eq!(json["sessions"][0]["posts_new"], 4);
    assert_eq!(json["sessions"][0]["posts_updated"], 2);
}

#[tokio::test]
async fn pages_list_includes_inactive() {
    let app = setup_test_app().await;
    let repo = app.db.page_repo();

    repo.add_page("alpha", "https://www.facebook.com/alpha", 60)
        .await
        .unwrap();
    repo.add_page("beta", "https://www.facebook.com/beta", 30)
        .await
        .unwrap();
    repo.deactivate_page("beta").await.unwrap();

    let (status, json) = get_json(app.router, "/v1/pages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);

    let pages = json["pages"].as_array().unwrap();
    let beta = pages
        .iter()
        .find(|p| p["page_name"] == "beta")
        .expect("beta should still be listed");
    assert_eq!(beta["is_active"], false);
}
