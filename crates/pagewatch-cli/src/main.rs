use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pagewatch_client::{BrowserFetcher, CookieStore, FacebookExtractor, HttpFetcher};
use pagewatch_core::models::PostFilter;
use pagewatch_core::scheduler::{Scheduler, SchedulerConfig, TracingCrawlReporter};
use pagewatch_core::traits::Fetcher;
use pagewatch_core::{CrawlReport, CrawlService};
use pagewatch_db::{Database, DatabaseConfig, PostRepository};

#[derive(Parser)]
#[command(name = "pagewatch", version, about = "Facebook page post crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a Facebook page once and store the posts
    Crawl {
        /// Page URL or username (a bare name becomes facebook.com/<name>)
        page: String,

        /// Page name identifier (defaults to the last URL segment)
        #[arg(short, long)]
        name: Option<String>,

        /// Number of scroll passes to load more posts
        #[arg(short, long, default_value_t = 5, env = "PAGEWATCH_SCROLLS")]
        scrolls: usize,

        /// Print extracted posts instead of saving to the database
        #[arg(long, default_value_t = false)]
        no_save: bool,

        /// Skip loading/saving session cookies
        #[arg(long, default_value_t = false)]
        no_cookies: bool,

        /// Directory for cookie files
        #[arg(long, default_value = "cookies", env = "PAGEWATCH_COOKIES_DIR")]
        cookies_dir: PathBuf,

        /// Fetch with plain HTTP instead of a headless browser
        #[arg(long, default_value_t = false)]
        static_html: bool,
    },

    /// Manage the registry of monitored pages
    #[command(subcommand)]
    Pages(PagesCommand),

    /// Show recently stored posts
    Posts {
        /// Filter by page name
        #[arg(short, long)]
        page: Option<String>,

        /// Substring to search for in post content
        #[arg(short, long)]
        search: Option<String>,

        /// Number of posts to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show recent crawl sessions
    Sessions {
        /// Number of sessions to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Run the scheduler loop, crawling every active page on its frequency
    Watch {
        /// Seconds between registry checks
        #[arg(short, long, default_value_t = 60, env = "PAGEWATCH_TICK_SECONDS")]
        interval: u64,

        /// Number of scroll passes per crawl
        #[arg(short, long, default_value_t = 5, env = "PAGEWATCH_SCROLLS")]
        scrolls: usize,

        /// Directory for cookie files
        #[arg(long, default_value = "cookies", env = "PAGEWATCH_COOKIES_DIR")]
        cookies_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum PagesCommand {
    /// Add a page (or reactivate and update an existing one)
    Add {
        /// Page name identifier
        name: String,

        /// Page URL (defaults to facebook.com/<name>)
        #[arg(short, long)]
        url: Option<String>,

        /// Crawl frequency in minutes
        #[arg(short, long, default_value_t = 60)]
        frequency: u32,
    },
    /// List all registered pages
    List,
    /// Deactivate a page (history is kept)
    Remove {
        /// Page name identifier
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pagewatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            page,
            name,
            scrolls,
            no_save,
            no_cookies,
            cookies_dir,
            static_html,
        } => {
            let (page_url, page_name) = resolve_page(&page, name.as_deref());
            if static_html {
                let fetcher =
                    HttpFetcher::new().map_err(|e| anyhow::anyhow!(e))?;
                cmd_crawl(fetcher, &page_url, &page_name, !no_save).await?;
            } else {
                let mut fetcher = BrowserFetcher::new()
                    .await
                    .map_err(|e| anyhow::anyhow!(e))?
                    .scrolls(scrolls);
                if !no_cookies {
                    fetcher = fetcher.cookie_store(CookieStore::new(&cookies_dir, "default"));
                }
                cmd_crawl(fetcher, &page_url, &page_name, !no_save).await?;
            }
        }
        Commands::Pages(command) => cmd_pages(command).await?,
        Commands::Posts {
            page,
            search,
            limit,
        } => cmd_posts(page, search, limit).await?,
        Commands::Sessions { limit } => cmd_sessions(limit).await?,
        Commands::Watch {
            interval,
            scrolls,
            cookies_dir,
        } => cmd_watch(interval, scrolls, cookies_dir).await?,
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

/// Turn a URL-or-username argument into a (url, name) pair.
fn resolve_page(page: &str, name: Option<&str>) -> (String, String) {
    let url = if page.starts_with("http") {
        page.to_string()
    } else {
        format!("https://www.facebook.com/{page}")
    };

    let derived = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(page)
        .to_string();
    let name = name.map(str::to_string).unwrap_or(derived);

    (url, name)
}

async fn cmd_crawl<F>(fetcher: F, page_url: &str, page_name: &str, save: bool) -> Result<()>
where
    F: Fetcher + 'static,
{
    let extractor = FacebookExtractor::new().map_err(|e| anyhow::anyhow!(e))?;

    let report = if save {
        let db = connect_db().await?;
        let service = CrawlService::with_store(fetcher, extractor, db.post_repo());
        service
            .run(page_url, page_name)
            .await
            .map_err(|e| anyhow::anyhow!(e))?
    } else {
        let service: CrawlService<_, _, PostRepository> = CrawlService::new(fetcher, extractor);
        service
            .run(page_url, page_name)
            .await
            .map_err(|e| anyhow::anyhow!(e))?
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &CrawlReport) {
    println!("Crawl results for {}", report.page_name);
    println!("  found:     {}", report.posts_found);
    if report.session_id.is_some() {
        println!("  new:       {}", report.posts_new);
        println!("  updated:   {}", report.posts_updated);
        println!("  unchanged: {}", report.unchanged);
    }

    // In no-save mode the posts only exist here, so print them in full.
    for (i, post) in report.posts.iter().enumerate() {
        println!("\nPost {}:", i + 1);
        println!("  id:      {}", post.post_id);
        if let Some(content) = &post.content {
            let preview: String = content.chars().take(100).collect();
            println!("  content: {preview}");
        }
        println!("  media:   {} items", post.media_urls.len());
        println!(
            "  engagement: {} likes, {} comments, {} shares",
            post.engagement.likes, post.engagement.comments, post.engagement.shares
        );
        if let Some(url) = &post.post_url {
            println!("  url:     {url}");
        }
    }
}

async fn cmd_pages(command: PagesCommand) -> Result<()> {
    let db = connect_db().await?;
    let repo = db.page_repo();

    match command {
        PagesCommand::Add {
            name,
            url,
            frequency,
        } => {
            let url = url.unwrap_or_else(|| format!("https://www.facebook.com/{name}"));
            let page = repo
                .add_page(&name, &url, frequency)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!(
                "Monitoring {} ({}) every {} minutes",
                page.page_name, page.page_url, page.crawl_frequency_minutes
            );
        }
        PagesCommand::List => {
            let pages = repo.list_pages().await.map_err(|e| anyhow::anyhow!(e))?;
            if pages.is_empty() {
                println!("No pages registered");
                return Ok(());
            }
            for page in pages {
                let status = if page.is_active { "active" } else { "inactive" };
                let last = page
                    .last_crawled_at
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "  [{status}] {} every {}m, last crawled {last}",
                    page.page_name, page.crawl_frequency_minutes
                );
            }
        }
        PagesCommand::Remove { name } => {
            repo.deactivate_page(&name)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("Deactivated {name}");
        }
    }

    Ok(())
}

async fn cmd_posts(page: Option<String>, search: Option<String>, limit: usize) -> Result<()> {
    let db = connect_db().await?;
    let posts = db
        .post_repo()
        .recent_posts(&PostFilter {
            page_name: page,
            search,
            ..PostFilter::recent(limit)
        })
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if posts.is_empty() {
        println!("No posts found");
        return Ok(());
    }

    for stored in &posts {
        let posted = stored
            .post
            .posted_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let preview: String = stored
            .post
            .content
            .as_deref()
            .unwrap_or("<media only>")
            .chars()
            .take(80)
            .collect();
        println!(
            "  [{posted}] {} / {} - {preview}",
            stored.post.page_name, stored.post.post_id
        );
    }
    println!("\nTotal: {} posts", posts.len());

    Ok(())
}

async fn cmd_sessions(limit: usize) -> Result<()> {
    let db = connect_db().await?;
    let sessions = db
        .post_repo()
        .recent_sessions(limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if sessions.is_empty() {
        println!("No crawl sessions recorded");
        return Ok(());
    }

    for session in &sessions {
        println!(
            "  [{}] {} - {} (found {}, new {}, updated {}){}",
            session.status,
            session.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            session.page_name,
            session.posts_found,
            session.posts_new,
            session.posts_updated,
            session
                .error_message
                .as_deref()
                .map(|e| format!(" - {e}"))
                .unwrap_or_default(),
        );
    }

    Ok(())
}

async fn cmd_watch(interval: u64, scrolls: usize, cookies_dir: PathBuf) -> Result<()> {
    let db = connect_db().await?;

    let fetcher = BrowserFetcher::new()
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .scrolls(scrolls)
        .cookie_store(CookieStore::new(&cookies_dir, "default"));
    let extractor = FacebookExtractor::new().map_err(|e| anyhow::anyhow!(e))?;

    let service = CrawlService::with_store(fetcher, extractor, db.post_repo());
    let scheduler = Scheduler::new(
        service,
        db.page_repo(),
        SchedulerConfig {
            tick_interval: Duration::from_secs(interval),
        },
    );

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            token.cancel();
        }
    });

    tracing::info!(interval, "Watching registered pages");
    scheduler
        .run(cancel, &TracingCrawlReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
