use crate::models::Listing;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum ListingError {
    #[error("missing {0} element")]
    MissingField(&'static str),
    #[error("invalid selector: {0}")]
    Selector(String),
}

/// A listing that could not be parsed; its siblings on the page are unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedListing {
    pub index: usize,
    pub reason: String,
}

/// Everything recovered from one page of markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub listings: Vec<Listing>,
    pub skipped: Vec<SkippedListing>,
}

/// A paginated listing site.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Returns the name of the scraper/website
    fn name(&self) -> &str;

    fn page_url(&self, page: u32) -> String;

    /// Fetches one results page. No retries: a failure is reported once.
    async fn fetch_page(&self, page: u32) -> Result<String, FetchError>;

    /// Parses every listing on a page, in document order.
    fn parse_page(&self, html: &str, page: u32) -> ParsedPage;
}
