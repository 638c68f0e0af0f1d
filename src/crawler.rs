use crate::models::Listing;
use crate::scraper_trait::{Scraper, SkippedListing};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// What happened to one page of the crawl.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Fetched {
        page: u32,
        listings: usize,
        skipped: Vec<SkippedListing>,
    },
    Skipped {
        page: u32,
        reason: String,
    },
}

impl PageOutcome {
    pub fn page(&self) -> u32 {
        match self {
            PageOutcome::Fetched { page, .. } | PageOutcome::Skipped { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    /// In page order, then document order within each page.
    pub listings: Vec<Listing>,
    pub pages: Vec<PageOutcome>,
}

impl CrawlReport {
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn failed_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|outcome| matches!(outcome, PageOutcome::Skipped { .. }))
            .map(PageOutcome::page)
            .collect()
    }

    pub fn skipped_listings(&self) -> usize {
        self.pages
            .iter()
            .map(|outcome| match outcome {
                PageOutcome::Fetched { skipped, .. } => skipped.len(),
                PageOutcome::Skipped { .. } => 0,
            })
            .sum()
    }
}

/// Drives a scraper over an inclusive page range, one page at a time.
pub struct Crawler<'a> {
    scraper: &'a dyn Scraper,
    raw_dir: Option<PathBuf>,
}

impl<'a> Crawler<'a> {
    pub fn new(scraper: &'a dyn Scraper) -> Self {
        Self { scraper, raw_dir: None }
    }

    /// Keep each fetched page under `dir` when TRACE logging is on.
    pub fn with_raw_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw_dir = Some(dir.into());
        self
    }

    pub async fn crawl(&self, pages: RangeInclusive<u32>) -> CrawlReport {
        let mut report = CrawlReport::default();

        for page in pages {
            tracing::info!("Processing page {} from {}", page, self.scraper.name());

            let html = match self.scraper.fetch_page(page).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Page {} failed, skipping: {}", page, e);
                    report.pages.push(PageOutcome::Skipped { page, reason: e.to_string() });
                    continue;
                }
            };

            self.keep_raw_page(page, &html);

            let parsed = self.scraper.parse_page(&html, page);
            let count = parsed.listings.len();
            report.listings.extend(parsed.listings);

            tracing::info!("Page {} done: {} listings ({} skipped)", page, count, parsed.skipped.len());
            report.pages.push(PageOutcome::Fetched {
                page,
                listings: count,
                skipped: parsed.skipped,
            });
        }

        tracing::info!("Crawl finished: {} listings from {} pages", report.listings.len(), report.pages.len());
        report
    }

    fn keep_raw_page(&self, page: u32, html: &str) {
        let Some(dir) = &self.raw_dir else {
            return;
        };
        if !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }
        let path = dir.join(format!("page_{}.html", page));
        if let Err(e) = std::fs::write(&path, html) {
            tracing::warn!("Failed to write raw page {}: {}", path.display(), e);
        }
    }
}
