use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Engagement counters scraped from a post. Unparseable counts stay 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Engagement {
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub shares: i64,
}

/// One Facebook post observed on a page timeline.
///
/// `(page_name, post_id)` is the logical identity; the store enforces it as
/// a unique key. A second observation of the same identity is an update that
/// keeps the original `crawled_at` and refreshes the content fields.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Post {
    pub page_name: String,
    /// Stable external identity, derived from a permalink or embedded
    /// identifier where possible, else a content fingerprint.
    pub post_id: String,
    pub content: Option<String>,
    pub media_urls: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub engagement: Engagement,
    pub post_url: Option<String>,
    /// Set once at extraction time, never mutated by updates.
    pub crawled_at: DateTime<Utc>,
    /// Bumped on every write.
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a candidate post with extraction timestamps set to now.
    pub fn candidate(page_name: impl Into<String>, post_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            page_name: page_name.into(),
            post_id: post_id.into(),
            content: None,
            media_urls: Vec::new(),
            posted_at: None,
            engagement: Engagement::default(),
            post_url: None,
            crawled_at: now,
            updated_at: now,
        }
    }

    /// Field-wise comparison of the fields an update may change.
    ///
    /// Deliberately not a hash comparison so callers can log which field
    /// differed when diagnosing noisy re-crawls.
    pub fn content_differs(&self, other: &Post) -> bool {
        self.content != other.content
            || self.media_urls != other.media_urls
            || self.engagement != other.engagement
    }
}

/// A post as persisted, carrying the store-assigned surrogate id.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredPost {
    pub id: Uuid,
    #[serde(flatten)]
    pub post: Post,
}

/// Fallback identity for posts with no extractable identifier.
///
/// SHA-256 over the normalized text (first 100 chars, whitespace collapsed)
/// plus the parsed timestamp, truncated to 16 hex chars. Deterministic, but
/// a heuristic: two near-identical posts with the same timestamp collide.
/// Reconciliation resolves collisions last-seen-wins and counts them.
pub fn content_fingerprint(content: &str, posted_at: Option<DateTime<Utc>>) -> String {
    let normalized: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let prefix: String = normalized.chars().take(100).collect();
    let stamp = posted_at
        .map(|t| t.timestamp().to_string())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b"_");
    hasher.update(stamp.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!("generated_{}", &digest[..16])
}

/// Status of a crawl session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(SessionStatus::Running),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}

/// One bounded execution of fetch+extract+persist for a single page.
///
/// Created `running` before extraction starts; exactly one terminal
/// transition to `completed` or `failed` sets `finished_at`. Never re-opened.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CrawlSession {
    pub id: Uuid,
    pub page_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub posts_found: u32,
    pub posts_new: u32,
    pub posts_updated: u32,
    pub status: SessionStatus,
    pub error_message: Option<String>,
}

/// Reference to an open (`running`) crawl session.
///
/// Not `Clone`: terminal writes consume the handle, so completing or failing
/// the same session twice does not compile in safe usage. The store still
/// guards the row at runtime for handles it does not recognize.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: Uuid,
    pub page_name: String,
}

/// A page in the monitoring registry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitoredPage {
    pub id: Uuid,
    pub page_name: String,
    pub page_url: String,
    pub is_active: bool,
    pub crawl_frequency_minutes: u32,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

impl MonitoredPage {
    /// Whether this page is due for another crawl at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_crawled_at {
            None => true,
            Some(last) => now - last >= chrono::TimeDelta::minutes(self.crawl_frequency_minutes as i64),
        }
    }
}

/// Filter for dashboard post queries.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub page_name: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Substring match over `content`.
    pub search: Option<String>,
    pub limit: usize,
}

impl PostFilter {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

/// Overview counters for the dashboard.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StoreStats {
    pub total_posts: i64,
    pub pages_monitored: i64,
    pub posts_last_24h: i64,
    pub last_crawl: Option<DateTime<Utc>>,
}
