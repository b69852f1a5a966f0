pub mod crawl;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod testutil;
pub mod traits;

pub use crawl::{CrawlReport, CrawlService, PageLocks};
pub use error::AppError;
pub use models::{
    CrawlSession, Engagement, MonitoredPage, Post, PostFilter, SessionHandle, SessionStatus,
    StoreStats, StoredPost, content_fingerprint,
};
pub use reconcile::{ReconcileOutcome, reconcile};
pub use scheduler::{CrawlEvent, CrawlReporter, Scheduler, SchedulerConfig, TracingCrawlReporter};
pub use session::SessionAccountant;
pub use traits::{Extractor, Fetcher, PageRegistry, PostStore};
