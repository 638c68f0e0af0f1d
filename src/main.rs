mod analysis;
mod charts;
mod config;
mod crawler;
mod extractor;
mod http_client;
mod models;
mod scraper_trait;
mod scrapers;
mod storage;
mod throttle;

use analysis::{area_sqm, format_price, mean_price, Analyzer};
use anyhow::{Context, Result};
use charts::{ChartRenderer, EchartsHtml};
use clap::Parser;
use config::Config;
use crawler::{CrawlReport, Crawler};
use scraper_trait::Scraper;
use scrapers::LianjiaScraper;

const RAW_DIR: &str = "data/raw";
const DIRECTORIES: [&str; 3] = [RAW_DIR, "data/processed", "output"];
const TOP_LISTINGS: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "zufangfinder")]
#[command(about = "Crawl Lianjia rental listings and analyze their prices", long_about = None)]
struct Args {
    /// Skip crawling and analyze the CSV from a previous run
    #[arg(long)]
    analyze_only: bool,

    /// Test URL fetching - fetch a URL with the crawl client and report on it
    #[arg(long)]
    test_url: Option<String>,

    /// Save HTML to file when using --test-url
    #[arg(long)]
    save_html: Option<String>,

    /// Write the default data/config.yaml and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init_config {
        Config::create_default()?;
        println!("Default configuration written to {}", config::CONFIG_PATH);
        return Ok(());
    }

    let config = Config::load()?;
    init_logging(&config);

    if let Some(url) = args.test_url {
        return test_url_fetch(&config, &url, args.save_html.as_deref()).await;
    }

    ensure_directories()?;

    if args.analyze_only {
        return run_analysis(&config);
    }

    println!("{}", "=".repeat(60));
    println!("           链家租房信息分析系统");
    println!("{}", "=".repeat(60));

    let scraper = LianjiaScraper::from_config(&config)?;
    tracing::info!(
        "Crawling pages {}-{} from {} ({})",
        config.start_page,
        config.end_page,
        scraper.name(),
        scraper.page_url(config.start_page)
    );

    if run(&config, &scraper).await?.is_none() {
        return Ok(());
    }

    println!("\n📁 项目完成！生成的文件：");
    println!("   - {} (房源数据)", config.csv_path().display());
    println!("   - {} (高价房源图表)", config.price_chart_path().display());
    println!("   - {} (价格分布图表)", config.distribution_chart_path().display());
    println!("   - {}/ (原始数据目录)", RAW_DIR);
    println!("   - data/processed/ (处理后的数据目录)");

    Ok(())
}

/// Crawls the configured page range, then saves and analyzes what came back.
/// Returns `None` without writing any file when no listing was collected.
async fn run(config: &Config, scraper: &dyn Scraper) -> Result<Option<CrawlReport>> {
    let report = Crawler::new(scraper)
        .with_raw_dir(RAW_DIR)
        .crawl(config.start_page..=config.end_page)
        .await;

    if report.is_empty() {
        println!("❌ 数据获取失败");
        if !report.failed_pages().is_empty() {
            println!("   失败页面: {:?}", report.failed_pages());
        }
        return Ok(None);
    }

    let csv_path = config.csv_path();
    storage::save_listings(&csv_path, &report.listings)?;
    println!("💾 数据已保存到: {}", csv_path.display());
    print_crawl_summary(&report);

    run_analysis(config)?;
    Ok(Some(report))
}

/// Use RUST_LOG if set, otherwise the level from the config.
fn init_logging(config: &Config) {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        tracing::info!("Logging level set from RUST_LOG environment variable");
        return;
    }

    let level = config.tracing_level.to_lowercase();
    let max_level = match level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid tracing level '{}', using 'info'", level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .init();

    tracing::debug!("Logging level set to: {}", level);
}

fn ensure_directories() -> Result<()> {
    for dir in DIRECTORIES {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir))?;
    }
    tracing::debug!("Directory layout ready: {:?}", DIRECTORIES);
    Ok(())
}

fn print_crawl_summary(report: &CrawlReport) {
    let listings = &report.listings;
    let prices: Vec<u64> = listings.iter().map(|l| l.price).collect();

    println!("\n📊 数据统计:");
    println!("   房源数量: {}", listings.len());

    if let (Some(min), Some(max)) = (prices.iter().min(), prices.iter().max()) {
        println!("   平均价格: {}", format_price(mean_price(&prices)));
        println!("   价格范围: {} - {}元/月", min, max);
    }

    let areas: Vec<f64> = listings
        .iter()
        .filter_map(|l| l.area.as_deref().and_then(area_sqm))
        .collect();
    if !areas.is_empty() {
        let min = areas.iter().copied().fold(f64::INFINITY, f64::min);
        let max = areas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!("   面积范围: {:.1} - {:.1}㎡", min, max);
    }

    let failed = report.failed_pages();
    if !failed.is_empty() {
        println!("   跳过页面: {:?}", failed);
    }
    if report.skipped_listings() > 0 {
        println!("   解析失败房源: {}", report.skipped_listings());
    }
}

fn run_analysis(config: &Config) -> Result<()> {
    let csv_path = config.csv_path();
    let analyzer = Analyzer::load(&csv_path, config.gazetteer())?;
    let report = analyzer.report();

    println!("\n{}", "=".repeat(50));
    println!("           租房数据分析报告");
    println!("{}", "=".repeat(50));
    print!("{}", report);

    let renderer = EchartsHtml;
    renderer.bar(
        "高价房源TOP20",
        "月租金(元)",
        &analyzer.top_by_price(TOP_LISTINGS),
        &config.price_chart_path(),
    )?;
    println!("📊 价格分析图表已生成: {}", config.price_chart_path().display());

    renderer.pie("租金价格分布", &analyzer.distribution(), &config.distribution_chart_path())?;
    println!("📊 价格分布图表已生成: {}", config.distribution_chart_path().display());

    println!("\n🎉 分析完成！共分析 {} 条有效数据", report.cleaned);
    Ok(())
}

/// Test URL fetching - downloads and reports on an HTML response
async fn test_url_fetch(config: &Config, url: &str, save_path: Option<&str>) -> Result<()> {
    tracing::info!("Test fetch of {}", url);
    println!("Testing URL fetch: {}", url);
    println!("{}", "=".repeat(80));
    println!("User-Agent: {}", config.user_agent);

    let client = http_client::create_http_client(&config.user_agent, config.request_timeout_secs)?;

    println!("Sending request...");
    let response = client.get(url).send().await?;

    println!("Status: {}", response.status());
    println!("\nResponse Headers:");
    for (name, value) in response.headers() {
        println!("  {}: {:?}", name, value);
    }

    println!("{}", "=".repeat(80));

    let body = String::from_utf8_lossy(&response.bytes().await?).into_owned();

    if let Some(path) = save_path {
        std::fs::write(path, &body)?;
        println!("HTML saved to: {}", path);
    } else {
        println!("{}", body.chars().take(2000).collect::<String>());
    }
    println!("{}", "=".repeat(80));

    println!("Total length: {} bytes", body.len());

    if http_client::looks_like_bot_check(&body) {
        println!("\n⚠️  WARNING: Response looks like a captcha or verification page!");
        println!("Consider:");
        println!("  - Increasing min_delay_ms / max_delay_ms in config");
        println!("  - Changing user_agent in config");
        println!("  - Using a different IP/proxy");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::tests::StubScraper;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config {
            output_dir: dir.path().join("output").to_string_lossy().into_owned(),
            start_page: 1,
            end_page: 3,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_run_without_listings_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let scraper = StubScraper::new(vec![1, 2, 3]);

        let outcome = run(&config, &scraper).await.unwrap();

        assert!(outcome.is_none());
        assert!(!config.csv_path().exists());
        assert!(!config.price_chart_path().exists());
        assert!(!config.distribution_chart_path().exists());
        assert!(!dir.path().join("output").exists());
    }

    #[tokio::test]
    async fn test_run_writes_csv_and_charts() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let scraper = StubScraper::new(vec![2]);

        let report = run(&config, &scraper).await.unwrap().unwrap();

        assert_eq!(report.listings.len(), 4);
        assert_eq!(report.failed_pages(), vec![2]);
        assert!(config.csv_path().exists());
        assert!(config.price_chart_path().exists());
        assert!(config.distribution_chart_path().exists());

        let table = storage::load_table(&config.csv_path()).unwrap();
        assert_eq!(table.rows.len(), 4);
    }

    #[tokio::test]
    async fn test_url_fetch_uses_loaded_config() {
        use wiremock::{
            Mock, MockServer, ResponseTemplate,
            matchers::{header, method},
        };

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "zufangfinder-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<div class=\"content__list\"></div>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let saved = dir.path().join("page.html");
        let config = Config {
            user_agent: "zufangfinder-test".to_string(),
            ..Config::default()
        };

        test_url_fetch(&config, &mock_server.uri(), saved.to_str())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&saved).unwrap(), "<div class=\"content__list\"></div>");
    }
}
