use pagewatch_db::Database;

/// Shared application state for all route handlers.
pub struct AppState {
    pub db: Database,
}
