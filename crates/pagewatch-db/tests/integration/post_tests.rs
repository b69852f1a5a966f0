use pagewatch_core::models::{Engagement, Post, PostFilter};
use pagewatch_core::reconcile::reconcile;
use pagewatch_db::PostRepository;

use crate::common::setup_test_db;

fn sample_post(page: &str, id: &str, content: &str) -> Post {
    let mut post = Post::candidate(page, id);
    post.content = Some(content.to_string());
    post.media_urls = vec!["https://scontent.example/a.jpg".to_string()];
    post.engagement = Engagement {
        likes: 10,
        comments: 2,
        shares: 1,
    };
    post.post_url = Some(format!("https://www.facebook.com/{page}/posts/{id}"));
    post
}

#[tokio::test]
async fn upsert_and_find_roundtrip() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let post = sample_post("somepage", "abc123", "Hello world");
    let id = repo.upsert_post(&post).await.unwrap();
    assert!(!id.is_nil());

    let stored = repo
        .find_post("somepage", "abc123")
        .await
        .unwrap()
        .expect("Should find the post");

    assert_eq!(stored.id, id);
    assert_eq!(stored.post.content.as_deref(), Some("Hello world"));
    assert_eq!(
        stored.post.media_urls,
        vec!["https://scontent.example/a.jpg"]
    );
    assert_eq!(stored.post.engagement.likes, 10);
}

#[tokio::test]
async fn upsert_same_identity_updates_in_place_preserving_crawled_at() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let first = sample_post("somepage", "abc123", "Original");
    let first_id = repo.upsert_post(&first).await.unwrap();
    let original = repo.find_post("somepage", "abc123").await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let mut second = sample_post("somepage", "abc123", "Edited");
    second.engagement.likes = 99;
    let second_id = repo.upsert_post(&second).await.unwrap();

    assert_eq!(first_id, second_id, "same identity keeps the surrogate id");

    let stored = repo.find_post("somepage", "abc123").await.unwrap().unwrap();
    assert_eq!(stored.post.content.as_deref(), Some("Edited"));
    assert_eq!(stored.post.engagement.likes, 99);
    assert_eq!(
        stored.post.crawled_at, original.post.crawled_at,
        "crawled_at survives the update"
    );
    assert!(stored.post.updated_at > original.post.updated_at);
}

#[tokio::test]
async fn same_post_id_on_different_pages_are_distinct() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let a = repo
        .upsert_post(&sample_post("page_a", "shared", "From A"))
        .await
        .unwrap();
    let b = repo
        .upsert_post(&sample_post("page_b", "shared", "From B"))
        .await
        .unwrap();
    assert_ne!(a, b);

    let from_a = repo.find_post("page_a", "shared").await.unwrap().unwrap();
    assert_eq!(from_a.post.content.as_deref(), Some("From A"));
}

#[tokio::test]
async fn reconcile_then_persist_batch_end_to_end() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    repo.upsert_post(&sample_post("somepage", "known", "Old content"))
        .await
        .unwrap();

    let mut changed = sample_post("somepage", "known", "Old content");
    changed.engagement.likes = 500;
    let batch = vec![changed, sample_post("somepage", "fresh", "Brand new")];

    let outcome = reconcile(&repo, "somepage", batch).await.unwrap();
    assert_eq!(outcome.to_insert.len(), 1);
    assert_eq!(outcome.to_update.len(), 1);

    repo.persist_batch(&outcome).await.unwrap();

    let known = repo.find_post("somepage", "known").await.unwrap().unwrap();
    assert_eq!(known.post.engagement.likes, 500);
    assert!(repo.find_post("somepage", "fresh").await.unwrap().is_some());
}

#[tokio::test]
async fn recent_posts_filters_by_page_and_search() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    repo.upsert_post(&sample_post("alpha", "1", "Rust release announcement"))
        .await
        .unwrap();
    repo.upsert_post(&sample_post("alpha", "2", "Weekend photos"))
        .await
        .unwrap();
    repo.upsert_post(&sample_post("beta", "3", "Rust meetup tonight"))
        .await
        .unwrap();

    let alpha_only = repo
        .recent_posts(&PostFilter {
            page_name: Some("alpha".into()),
            ..PostFilter::recent(10)
        })
        .await
        .unwrap();
    assert_eq!(alpha_only.len(), 2);
    assert!(alpha_only.iter().all(|p| p.post.page_name == "alpha"));

    let rust_posts = repo
        .recent_posts(&PostFilter {
            search: Some("rust".into()),
            ..PostFilter::recent(10)
        })
        .await
        .unwrap();
    assert_eq!(rust_posts.len(), 2, "search is case-insensitive");

    let limited = repo.recent_posts(&PostFilter::recent(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn stats_counts_posts_and_pages() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    repo.upsert_post(&sample_post("alpha", "1", "one")).await.unwrap();
    repo.upsert_post(&sample_post("alpha", "2", "two")).await.unwrap();
    repo.upsert_post(&sample_post("beta", "3", "three")).await.unwrap();

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total_posts, 3);
    assert_eq!(stats.pages_monitored, 2);
    assert_eq!(stats.posts_last_24h, 3);
}

#[tokio::test]
async fn health_check_succeeds_on_live_pool() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);
    repo.health_check().await.unwrap();
}
