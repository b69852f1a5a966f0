use crate::error::AppError;
use crate::models::{SessionHandle, SessionStatus};
use crate::traits::PostStore;

/// Scoped lifecycle for crawl-session bookkeeping.
///
/// `begin` commits a `running` row before any extraction work so an aborted
/// process still leaves an auditable trail. `complete` and `fail` consume
/// the handle; the borrow checker rules out a second terminal write through
/// the same handle, and the store rejects handles it does not recognize with
/// [`AppError::SessionMisuse`].
#[derive(Clone)]
pub struct SessionAccountant<S: PostStore> {
    store: S,
}

impl<S: PostStore> SessionAccountant<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn begin(&self, page_name: &str) -> Result<SessionHandle, AppError> {
        let handle = self.store.begin_session(page_name).await?;
        tracing::debug!(page = page_name, session_id = %handle.id, "Crawl session opened");
        Ok(handle)
    }

    pub async fn complete(
        &self,
        handle: SessionHandle,
        found: u32,
        new: u32,
        updated: u32,
    ) -> Result<(), AppError> {
        let session_id = handle.id;
        self.store
            .finalize_session(handle, SessionStatus::Completed, found, new, updated, None)
            .await?;
        tracing::info!(%session_id, found, new, updated, "Crawl session completed");
        Ok(())
    }

    /// Record a failed session. Counts stay zero: nothing from a failed
    /// crawl is persisted, so nothing was found as far as the log is
    /// concerned.
    pub async fn fail(&self, handle: SessionHandle, error_message: &str) -> Result<(), AppError> {
        let session_id = handle.id;
        self.store
            .finalize_session(handle, SessionStatus::Failed, 0, 0, 0, Some(error_message))
            .await?;
        tracing::warn!(%session_id, error = error_message, "Crawl session failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockStore;

    #[tokio::test]
    async fn begin_then_fail_records_failed_row_with_zero_counts() {
        let store = MockStore::empty();
        let accountant = SessionAccountant::new(store.clone());

        let handle = accountant.begin("testpage").await.unwrap();
        accountant.fail(handle, "network timeout").await.unwrap();

        let sessions = store.recent_sessions(10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.posts_found, 0);
        assert_eq!(session.error_message.as_deref(), Some("network timeout"));
        assert!(session.finished_at.is_some());
    }

    #[tokio::test]
    async fn begin_then_complete_records_counts() {
        let store = MockStore::empty();
        let accountant = SessionAccountant::new(store.clone());

        let handle = accountant.begin("testpage").await.unwrap();
        accountant.complete(handle, 5, 3, 1).await.unwrap();

        let sessions = store.recent_sessions(10).await.unwrap();
        let session = &sessions[0];
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.posts_found, 5);
        assert_eq!(session.posts_new, 3);
        assert_eq!(session.posts_updated, 1);
        assert!(session.error_message.is_none());
    }

    #[tokio::test]
    async fn finalizing_unknown_handle_is_misuse() {
        use crate::models::SessionHandle;
        use uuid::Uuid;

        let store = MockStore::empty();
        let accountant = SessionAccountant::new(store);

        let bogus = SessionHandle {
            id: Uuid::new_v4(),
            page_name: "testpage".into(),
        };
        let err = accountant.fail(bogus, "whatever").await.unwrap_err();
        assert!(matches!(err, AppError::SessionMisuse(_)));
    }

    #[tokio::test]
    async fn finalizing_terminal_session_is_misuse() {
        use crate::models::SessionHandle;

        let store = MockStore::empty();
        let accountant = SessionAccountant::new(store.clone());

        let handle = accountant.begin("testpage").await.unwrap();
        let id = handle.id;
        accountant.complete(handle, 1, 1, 0).await.unwrap();

        // Re-forge a handle to the already-finalized row. The type system
        // prevents this in normal code; the store must still refuse it.
        let forged = SessionHandle {
            id,
            page_name: "testpage".into(),
        };
        let err = accountant.fail(forged, "late failure").await.unwrap_err();
        assert!(matches!(err, AppError::SessionMisuse(_)));
    }
}
