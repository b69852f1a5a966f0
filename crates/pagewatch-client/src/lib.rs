pub mod browser;
pub mod cookies;
pub mod extractor;
pub mod fetcher;

pub use browser::BrowserFetcher;
pub use cookies::CookieStore;
pub use extractor::FacebookExtractor;
pub use fetcher::HttpFetcher;
