use pagewatch_db::PageRepository;

use crate::common::setup_test_db;

#[tokio::test]
async fn add_list_and_deactivate_pages() {
    let (pool, _container) = setup_test_db().await;
    let repo = PageRepository::new(pool);

    let page = repo
        .add_page("somepage", "https://www.facebook.com/somepage", 60)
        .await
        .unwrap();
    assert!(page.is_active);
    assert_eq!(page.crawl_frequency_minutes, 60);
    assert!(page.last_crawled_at.is_none());

    repo.add_page("otherpage", "https://www.facebook.com/otherpage", 30)
        .await
        .unwrap();
    assert_eq!(repo.list_pages().await.unwrap().len(), 2);

    repo.deactivate_page("somepage").await.unwrap();
    let active = repo.active_pages().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].page_name, "otherpage");

    // Deactivated pages stay listed for history.
    assert_eq!(repo.list_pages().await.unwrap().len(), 2);
}

#[tokio::test]
async fn re_adding_a_page_reactivates_and_updates_it() {
    let (pool, _container) = setup_test_db().await;
    let repo = PageRepository::new(pool);

    let original = repo
        .add_page("somepage", "https://www.facebook.com/somepage", 60)
        .await
        .unwrap();
    repo.deactivate_page("somepage").await.unwrap();

    let readded = repo
        .add_page("somepage", "https://www.facebook.com/somepage.new", 15)
        .await
        .unwrap();

    assert_eq!(readded.id, original.id, "same registry row");
    assert!(readded.is_active);
    assert_eq!(readded.page_url, "https://www.facebook.com/somepage.new");
    assert_eq!(readded.crawl_frequency_minutes, 15);
}

#[tokio::test]
async fn touch_crawled_stamps_last_crawled_at() {
    let (pool, _container) = setup_test_db().await;
    let repo = PageRepository::new(pool);

    repo.add_page("somepage", "https://www.facebook.com/somepage", 60)
        .await
        .unwrap();
    repo.touch_crawled("somepage").await.unwrap();

    let pages = repo.list_pages().await.unwrap();
    assert!(pages[0].last_crawled_at.is_some());
}
