use pagewatch_core::error::AppError;
use pagewatch_core::models::{SessionHandle, SessionStatus};
use pagewatch_db::PostRepository;

use crate::common::setup_test_db;

#[tokio::test]
async fn begin_opens_running_session_immediately() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let handle = repo.begin_session("somepage").await.unwrap();

    // The running row is visible before any terminal write.
    let sessions = repo.recent_sessions(10).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, handle.id);
    assert_eq!(sessions[0].status, SessionStatus::Running);
    assert!(sessions[0].finished_at.is_none());
}

#[tokio::test]
async fn complete_writes_counts_and_finished_at() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let handle = repo.begin_session("somepage").await.unwrap();
    repo.finalize_session(handle, SessionStatus::Completed, 12, 7, 3, None)
        .await
        .unwrap();

    let session = &repo.recent_sessions(10).await.unwrap()[0];
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.posts_found, 12);
    assert_eq!(session.posts_new, 7);
    assert_eq!(session.posts_updated, 3);
    assert!(session.finished_at.is_some());
    assert!(session.error_message.is_none());
}

#[tokio::test]
async fn fail_records_error_message() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let handle = repo.begin_session("somepage").await.unwrap();
    repo.finalize_session(
        handle,
        SessionStatus::Failed,
        0,
        0,
        0,
        Some("browser timed out after 120s"),
    )
    .await
    .unwrap();

    let session = &repo.recent_sessions(10).await.unwrap()[0];
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(
        session.error_message.as_deref(),
        Some("browser timed out after 120s")
    );
}

#[tokio::test]
async fn finalizing_a_terminal_session_is_misuse() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let handle = repo.begin_session("somepage").await.unwrap();
    let id = handle.id;
    repo.finalize_session(handle, SessionStatus::Completed, 1, 1, 0, None)
        .await
        .unwrap();

    let forged = SessionHandle {
        id,
        page_name: "somepage".into(),
    };
    let err = repo
        .finalize_session(forged, SessionStatus::Failed, 0, 0, 0, Some("late"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SessionMisuse(_)));

    // The first terminal write is untouched.
    let session = &repo.recent_sessions(10).await.unwrap()[0];
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.posts_found, 1);
}

#[tokio::test]
async fn finalizing_an_unknown_handle_is_misuse() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    let bogus = SessionHandle {
        id: uuid::Uuid::new_v4(),
        page_name: "somepage".into(),
    };
    let err = repo
        .finalize_session(bogus, SessionStatus::Completed, 0, 0, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SessionMisuse(_)));
}

#[tokio::test]
async fn recent_sessions_ordered_newest_first_and_limited() {
    let (pool, _container) = setup_test_db().await;
    let repo = PostRepository::new(pool);

    for page in ["a", "b", "c"] {
        let handle = repo.begin_session(page).await.unwrap();
        repo.finalize_session(handle, SessionStatus::Completed, 0, 0, 0, None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let sessions = repo.recent_sessions(2).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].page_name, "c");
    assert_eq!(sessions[1].page_name, "b");
}
