use crate::config::Config;
use crate::extractor;
use crate::http_client;
use crate::models::{Listing, FIELD_SEPARATOR};
use crate::scraper_trait::{FetchError, ListingError, ParsedPage, Scraper, SkippedListing};
use crate::throttle::ThrottlePolicy;
use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

const LIST_CONTAINER: &str = ".content__list";
const LIST_ITEM: &str = ".content__list--item";
const TITLE_ANCHOR: &str = ".content__list--item--title a";
const PRICE: &str = ".content__list--item-price em";
const DESCRIPTION: &str = ".content__list--item--des";
const REGION: &str = ".content__list--item--brand";
const TAGS: &str = ".content__list--item--bottom i";

/// Parsed content of a price element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub amount: u64,
    /// Raw text when the source quoted a `low-high` range.
    pub range: Option<String>,
}

pub struct LianjiaScraper {
    client: reqwest::Client,
    origin: String,
    listing_path: String,
    throttle: ThrottlePolicy,
}

impl LianjiaScraper {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http_client::create_http_client(&config.user_agent, config.request_timeout_secs)?;
        Ok(Self::with_client(client, &config.origin, &config.listing_path, config.throttle()))
    }

    pub fn with_client(client: reqwest::Client, origin: &str, listing_path: &str, throttle: ThrottlePolicy) -> Self {
        let trimmed = listing_path.trim_matches('/');
        let listing_path = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        };

        Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
            listing_path,
            throttle,
        }
    }

    /// Parse the text of a price element: `"3500"` or a `"2900-3250"` range.
    /// Ranges resolve to the floored midpoint; anything unparseable becomes 0.
    pub fn parse_price(price_text: &str) -> Price {
        let text = price_text.trim();

        if text.contains('-') {
            let mut parts = text.split('-').map(|p| p.trim().parse::<u64>().ok());
            let amount = match (parts.next().flatten(), parts.next().flatten()) {
                (Some(low), Some(high)) => low.checked_add(high).map(|sum| sum / 2).unwrap_or(0),
                _ => 0,
            };
            return Price { amount, range: Some(text.to_string()) };
        }

        Price {
            amount: text.parse().unwrap_or(0),
            range: None,
        }
    }

    /// Resolve an href against the site origin. Absolute hrefs pass through.
    fn build_full_url(&self, href: &str) -> Option<String> {
        reqwest::Url::parse(&self.origin)
            .and_then(|base| base.join(href))
            .map(String::from)
            .map_err(|e| tracing::debug!("Could not resolve link '{}': {}", href, e))
            .ok()
    }

    fn selector(css: &str) -> Result<Selector, ListingError> {
        Selector::parse(css).map_err(|e| ListingError::Selector(format!("{}: {}", css, e)))
    }

    fn first_text(element: &ElementRef, css: &str) -> Result<Option<String>, ListingError> {
        let selector = Self::selector(css)?;
        Ok(element
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string()))
    }

    /// Text nodes of an element, trimmed, empties dropped, joined with `|`.
    fn joined_text(element: &ElementRef) -> String {
        element
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR)
    }

    fn parse_listing(&self, element: &ElementRef) -> Result<Listing, ListingError> {
        let title_selector = Self::selector(TITLE_ANCHOR)?;
        let title_el = element
            .select(&title_selector)
            .next()
            .ok_or(ListingError::MissingField("title"))?;

        let title = title_el.text().collect::<String>().trim().to_string();
        let link = self.build_full_url(title_el.value().attr("href").unwrap_or(""));

        let price_text = Self::first_text(element, PRICE)?
            .ok_or(ListingError::MissingField("price"))?;
        let price = Self::parse_price(&price_text);
        tracing::trace!("Price text extracted: '{}' -> {}", price_text, price.amount);

        let mut listing = Listing {
            title,
            link,
            price: price.amount,
            price_range: price.range,
            ..Default::default()
        };

        let description_selector = Self::selector(DESCRIPTION)?;
        if let Some(description_el) = element.select(&description_selector).next() {
            let description = Self::joined_text(&description_el);
            let fields = extractor::extract_fields(&description);
            listing.full_description = Some(description);
            listing.area = fields.area;
            listing.layout = fields.layout;
            listing.floor = fields.floor;
            listing.orientation = fields.orientation;
            listing.location = fields.location;
        }

        listing.region = Self::first_text(element, REGION)?;

        let tag_selector = Self::selector(TAGS)?;
        listing.tags = element
            .select(&tag_selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(listing)
    }
}

#[async_trait]
impl Scraper for LianjiaScraper {
    fn name(&self) -> &str {
        "Lianjia"
    }

    fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            format!("{}{}", self.origin, self.listing_path)
        } else {
            format!("{}{}pg{}/", self.origin, self.listing_path, page)
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<String, FetchError> {
        let url = self.page_url(page);
        tracing::info!("Fetching page {}: {}", page, url);

        self.throttle.wait().await;

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        let html = String::from_utf8_lossy(&body).into_owned();
        tracing::debug!("Fetched page {}: {} bytes", page, html.len());

        Ok(html)
    }

    fn parse_page(&self, html: &str, page: u32) -> ParsedPage {
        let document = Html::parse_document(html);
        let mut parsed = ParsedPage::default();

        let (container_selector, item_selector) = match (Self::selector(LIST_CONTAINER), Self::selector(LIST_ITEM)) {
            (Ok(c), Ok(i)) => (c, i),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Page {}: {}", page, e);
                return parsed;
            }
        };

        let Some(container) = document.select(&container_selector).next() else {
            tracing::warn!("Page {}: listing container not found. Page structure may have changed.", page);
            tracing::debug!("HTML preview (first 500 chars): {}", html.chars().take(500).collect::<String>());
            return parsed;
        };

        let items: Vec<ElementRef> = container.select(&item_selector).collect();
        tracing::info!("Page {}: found {} listing elements", page, items.len());

        for (index, element) in items.iter().enumerate() {
            match self.parse_listing(element) {
                Ok(listing) => {
                    tracing::debug!("Parsed listing: {}... - {}元/月", listing.short_title(20), listing.price);
                    parsed.listings.push(listing);
                }
                Err(e) => {
                    tracing::warn!("Page {}: skipping listing #{}: {}", page, index + 1, e);
                    parsed.skipped.push(SkippedListing { index, reason: e.to_string() });
                }
            }
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn scraper_for(origin: &str) -> LianjiaScraper {
        let client = http_client::create_http_client("Mozilla/5.0 (Test Agent)", 5).unwrap();
        LianjiaScraper::with_client(client, origin, "/zufang/", ThrottlePolicy::disabled())
    }

    fn scraper() -> LianjiaScraper {
        scraper_for("https://bj.lianjia.com")
    }

    const PAGE_HTML: &str = r#"
        <html>
            <body>
                <div class="content__list">
                    <div class="content__list--item">
                        <div class="content__list--item--main">
                            <p class="content__list--item--title">
                                <a class="twoline" href="/zufang/BJ2001.html">
                                    整租·望京花园 2室1厅 南
                                </a>
                            </p>
                            <p class="content__list--item--des">
                                <a>朝阳</a> <a>望京</a> 58.00㎡ <span>南</span> 2室1厅1卫 <span>中楼层 （18层）</span>
                            </p>
                            <p class="content__list--item--brand oneline">链家</p>
                            <p class="content__list--item--bottom oneline">
                                <i class="content__item__tag--is_subway_house">近地铁</i>
                                <i class="content__item__tag--decoration">精装</i>
                            </p>
                            <span class="content__list--item-price"><em>6500</em> 元/月</span>
                        </div>
                    </div>
                    <div class="content__list--item">
                        <div class="content__list--item--main">
                            <p class="content__list--item--des">海淀 45㎡</p>
                            <span class="content__list--item-price"><em>4000</em> 元/月</span>
                        </div>
                    </div>
                    <div class="content__list--item">
                        <div class="content__list--item--main">
                            <p class="content__list--item--title">
                                <a href="https://bj.lianjia.com/apartment/77.html">独栋·自如寓 开间</a>
                            </p>
                            <span class="content__list--item-price"><em>2900-3250</em> 元/月</span>
                        </div>
                    </div>
                </div>
            </body>
        </html>
    "#;

    #[test]
    fn test_page_url_shapes() {
        let scraper = scraper();
        assert_eq!(scraper.page_url(1), "https://bj.lianjia.com/zufang/");
        assert_eq!(scraper.page_url(2), "https://bj.lianjia.com/zufang/pg2/");
        assert_eq!(scraper.page_url(17), "https://bj.lianjia.com/zufang/pg17/");
    }

    #[test]
    fn test_page_url_normalizes_slashes() {
        let client = http_client::create_http_client("UA", 5).unwrap();
        let scraper = LianjiaScraper::with_client(client, "https://sh.lianjia.com/", "zufang", ThrottlePolicy::disabled());
        assert_eq!(scraper.page_url(1), "https://sh.lianjia.com/zufang/");
        assert_eq!(scraper.page_url(3), "https://sh.lianjia.com/zufang/pg3/");
    }

    #[test]
    fn test_parse_price_single_value() {
        assert_eq!(LianjiaScraper::parse_price("3500"), Price { amount: 3500, range: None });
    }

    #[test]
    fn test_parse_price_range_uses_floored_midpoint() {
        assert_eq!(
            LianjiaScraper::parse_price("2900-3250"),
            Price { amount: 3075, range: Some("2900-3250".to_string()) }
        );
        assert_eq!(LianjiaScraper::parse_price("3001-3002").amount, 3001);
    }

    #[test]
    fn test_parse_price_unparseable_is_zero() {
        assert_eq!(LianjiaScraper::parse_price("call for price"), Price { amount: 0, range: None });
        assert_eq!(LianjiaScraper::parse_price(""), Price { amount: 0, range: None });
    }

    #[test]
    fn test_parse_price_broken_range_keeps_raw_text() {
        assert_eq!(
            LianjiaScraper::parse_price("2900-"),
            Price { amount: 0, range: Some("2900-".to_string()) }
        );
        assert_eq!(LianjiaScraper::parse_price("a-b").range.as_deref(), Some("a-b"));
    }

    #[test]
    fn test_parse_price_tolerates_whitespace() {
        assert_eq!(LianjiaScraper::parse_price(" 2900 - 3250 ").amount, 3075);
        assert_eq!(LianjiaScraper::parse_price("\n 4200 \n").amount, 4200);
    }

    #[test]
    fn test_build_full_url() {
        let scraper = scraper();
        assert_eq!(
            scraper.build_full_url("/zufang/BJ1.html").as_deref(),
            Some("https://bj.lianjia.com/zufang/BJ1.html")
        );
        assert_eq!(
            scraper.build_full_url("https://bj.lianjia.com/apartment/77.html").as_deref(),
            Some("https://bj.lianjia.com/apartment/77.html")
        );
    }

    #[test]
    fn test_build_full_url_without_leading_slash() {
        let scraper = scraper();
        assert_eq!(
            scraper.build_full_url("zufang/BJ1.html").as_deref(),
            Some("https://bj.lianjia.com/zufang/BJ1.html")
        );
        assert_eq!(scraper_for("not an origin").build_full_url("zufang/BJ1.html"), None);
    }

    #[test]
    fn test_parse_full_listing() {
        let parsed = scraper().parse_page(PAGE_HTML, 1);
        let listing = &parsed.listings[0];

        assert_eq!(listing.title, "整租·望京花园 2室1厅 南");
        assert_eq!(listing.link.as_deref(), Some("https://bj.lianjia.com/zufang/BJ2001.html"));
        assert_eq!(listing.price, 6500);
        assert_eq!(listing.price_range, None);
        assert_eq!(
            listing.full_description.as_deref(),
            Some("朝阳|望京|58.00㎡|南|2室1厅1卫|中楼层 （18层）")
        );
        assert_eq!(listing.area.as_deref(), Some("58.00㎡"));
        assert_eq!(listing.layout.as_deref(), Some("2室1厅1卫"));
        assert_eq!(listing.floor.as_deref(), Some("中楼层 （18层）"));
        assert_eq!(listing.orientation.as_deref(), Some("南"));
        assert_eq!(listing.location.as_deref(), Some("朝阳|望京"));
        assert_eq!(listing.region.as_deref(), Some("链家"));
        assert_eq!(listing.tags, vec!["近地铁".to_string(), "精装".to_string()]);
    }

    #[test]
    fn test_failed_listing_does_not_abort_page() {
        let parsed = scraper().parse_page(PAGE_HTML, 1);

        assert_eq!(parsed.listings.len(), 2);
        assert_eq!(
            parsed.skipped,
            vec![SkippedListing { index: 1, reason: "missing title element".to_string() }]
        );

        let last = &parsed.listings[1];
        assert_eq!(last.title, "独栋·自如寓 开间");
        assert_eq!(last.link.as_deref(), Some("https://bj.lianjia.com/apartment/77.html"));
        assert_eq!(last.price, 3075);
        assert_eq!(last.price_range.as_deref(), Some("2900-3250"));
        assert_eq!(last.full_description, None);
        assert_eq!(last.region, None);
        assert!(last.tags.is_empty());
    }

    #[test]
    fn test_listing_without_price_is_skipped() {
        let html = r#"
            <div class="content__list">
                <div class="content__list--item">
                    <p class="content__list--item--title"><a href="/zufang/BJ9.html">合租·小屋</a></p>
                </div>
            </div>
        "#;
        let parsed = scraper().parse_page(html, 2);
        assert!(parsed.listings.is_empty());
        assert_eq!(parsed.skipped[0].reason, "missing price element");
    }

    #[test]
    fn test_page_without_container_yields_nothing() {
        let parsed = scraper().parse_page("<html><body><p>维护中</p></body></html>", 1);
        assert_eq!(parsed, ParsedPage::default());
    }

    #[tokio::test]
    async fn test_fetch_page_returns_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/zufang/pg2/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_HTML))
            .expect(1)
            .mount(&mock_server)
            .await;

        let scraper = scraper_for(&mock_server.uri());
        let html = scraper.fetch_page(2).await.unwrap();
        assert_eq!(scraper.parse_page(&html, 2).listings.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_page_decodes_utf8_regardless_of_charset() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/zufang/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=iso-8859-1")
                    .set_body_bytes("朝阳".as_bytes().to_vec()),
            )
            .mount(&mock_server)
            .await;

        let html = scraper_for(&mock_server.uri()).fetch_page(1).await.unwrap();
        assert_eq!(html, "朝阳");
    }

    #[tokio::test]
    async fn test_fetch_page_reports_status_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/zufang/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = scraper_for(&mock_server.uri()).fetch_page(1).await;
        assert!(matches!(result, Err(FetchError::Status(status)) if status == reqwest::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_fetch_page_reports_transport_failure() {
        // nothing listens on port 9 locally
        let result = scraper_for("http://127.0.0.1:9").fetch_page(1).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
