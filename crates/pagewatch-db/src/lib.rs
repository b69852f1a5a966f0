pub mod config;
pub mod database;
pub mod page_repository;
pub mod post_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use page_repository::PageRepository;
pub use post_repository::PostRepository;
