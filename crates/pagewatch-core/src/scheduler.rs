use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::crawl::{CrawlReport, CrawlService};
use crate::error::AppError;
use crate::models::MonitoredPage;
use crate::traits::{Extractor, Fetcher, PageRegistry, PostStore};

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    TickStarted {
        active: usize,
        due: usize,
    },
    PageQueued {
        page: &'a str,
    },
    PageCompleted {
        page: &'a str,
        report: &'a CrawlReport,
    },
    PageFailed {
        page: &'a str,
        error: &'a str,
        retryable: bool,
    },
    ShuttingDown,
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::TickStarted { active, due } => {
                tracing::debug!(active, due, "Scheduler tick");
            }
            CrawlEvent::PageQueued { page } => {
                tracing::info!(page, "Crawl queued");
            }
            CrawlEvent::PageCompleted { page, report } => {
                tracing::info!(
                    page,
                    found = report.posts_found,
                    new = report.posts_new,
                    updated = report.posts_updated,
                    "Crawl completed"
                );
            }
            CrawlEvent::PageFailed {
                page,
                error,
                retryable,
            } => {
                tracing::warn!(page, error, retryable, "Crawl failed");
            }
            CrawlEvent::ShuttingDown => {
                tracing::info!("Scheduler shutting down");
            }
        }
    }
}

/// Configuration for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the registry is checked for due pages.
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
        }
    }
}

/// Periodically crawls every active page that is due.
///
/// One task per due page; the crawl service's per-page locks keep a slow
/// crawl from overlapping a later tick for the same page. A failing page is
/// logged as a failed session and picked up again next cycle; it never stops
/// the loop.
pub struct Scheduler<F, E, S, P>
where
    F: Fetcher + 'static,
    E: Extractor + 'static,
    S: PostStore + 'static,
    P: PageRegistry,
{
    service: CrawlService<F, E, S>,
    registry: P,
    config: SchedulerConfig,
}

impl<F, E, S, P> Scheduler<F, E, S, P>
where
    F: Fetcher + 'static,
    E: Extractor + 'static,
    S: PostStore + 'static,
    P: PageRegistry,
{
    pub fn new(service: CrawlService<F, E, S>, registry: P, config: SchedulerConfig) -> Self {
        Self {
            service,
            registry,
            config,
        }
    }

    /// Run the scheduler loop until cancellation.
    pub async fn run<R: CrawlReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<(), AppError> {
        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick(reporter).await {
                tracing::error!(error = %e, "Scheduler tick failed");
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.tick_interval) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(CrawlEvent::ShuttingDown);
        Ok(())
    }

    /// Crawl every due page once. Public so the CLI can run a single pass.
    pub async fn tick<R: CrawlReporter>(&self, reporter: &R) -> Result<(), AppError> {
        let pages = self.registry.active_pages().await?;
        let now = chrono::Utc::now();
        let due: Vec<MonitoredPage> = pages.iter().filter(|p| p.is_due(now)).cloned().collect();

        reporter.report(CrawlEvent::TickStarted {
            active: pages.len(),
            due: due.len(),
        });

        let mut tasks = JoinSet::new();
        for page in due {
            reporter.report(CrawlEvent::PageQueued {
                page: &page.page_name,
            });
            let service = self.service.clone();
            tasks.spawn(async move {
                let result = service.run(&page.page_url, &page.page_name).await;
                (page, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (page, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!(error = %e, "Crawl task panicked");
                    continue;
                }
            };

            // The attempt happened either way; stamp it so one broken page
            // cannot hog every tick.
            if let Err(e) = self.registry.touch_crawled(&page.page_name).await {
                tracing::error!(page = %page.page_name, error = %e, "Failed to stamp last_crawled_at");
            }

            match result {
                Ok(report) => reporter.report(CrawlEvent::PageCompleted {
                    page: &page.page_name,
                    report: &report,
                }),
                Err(err) => reporter.report(CrawlEvent::PageFailed {
                    page: &page.page_name,
                    error: &err.to_string(),
                    retryable: err.is_retryable(),
                }),
            }
        }

        Ok(())
    }
}
