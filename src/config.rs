use serde::{Deserialize, Serialize};
use std::fs;
use std::env;
use std::path::{Path, PathBuf};
use anyhow::{Result, Context};

use crate::analysis::Gazetteer;
use crate::throttle::ThrottlePolicy;

pub const CONFIG_PATH: &str = "data/config.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default = "default_end_page")]
    pub end_page: u32,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_csv_name")]
    pub csv_name: String,
    #[serde(default = "default_districts")]
    pub districts: Vec<String>,
    #[serde(default = "default_other_district")]
    pub other_district: String,
    #[serde(default = "default_unknown_district")]
    pub unknown_district: String,
}

fn default_origin() -> String {
    "https://bj.lianjia.com".to_string()
}

fn default_listing_path() -> String {
    "/zufang/".to_string()
}

fn default_start_page() -> u32 {
    1
}

fn default_end_page() -> u32 {
    3
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    4000
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_csv_name() -> String {
    "lianjia_rentals.csv".to_string()
}

fn default_districts() -> Vec<String> {
    [
        "东城", "西城", "朝阳", "海淀", "丰台", "石景山",
        "通州", "昌平", "大兴", "顺义", "房山", "门头沟",
        "平谷", "怀柔", "密云", "延庆",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

fn default_other_district() -> String {
    "其他".to_string()
}

fn default_unknown_district() -> String {
    "未知".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            origin: default_origin(),
            listing_path: default_listing_path(),
            start_page: default_start_page(),
            end_page: default_end_page(),
            tracing_level: default_tracing_level(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            output_dir: default_output_dir(),
            csv_name: default_csv_name(),
            districts: default_districts(),
            other_district: default_other_district(),
            unknown_district: default_unknown_district(),
        }
    }
}

impl Config {
    /// Loads `data/config.yaml` when present, then applies environment overrides.
    /// A missing file is not an error: the crawl runs on defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config: Config = match fs::read_to_string(path) {
            Ok(config_str) => serde_yaml::from_str(&config_str)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            Err(_) => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(origin) = env::var("LIANJIA_ORIGIN") {
            self.origin = origin;
        }

        if let Ok(start_page) = env::var("START_PAGE") {
            self.start_page = start_page.parse()
                .context("Failed to parse START_PAGE environment variable")?;
        }

        if let Ok(end_page) = env::var("END_PAGE") {
            self.end_page = end_page.parse()
                .context("Failed to parse END_PAGE environment variable")?;
        }

        if let Ok(user_agent) = env::var("USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = timeout.parse()
                .context("Failed to parse REQUEST_TIMEOUT_SECS environment variable")?;
        }

        if let Ok(min_delay) = env::var("MIN_DELAY_MS") {
            self.min_delay_ms = min_delay.parse()
                .context("Failed to parse MIN_DELAY_MS environment variable")?;
        }

        if let Ok(max_delay) = env::var("MAX_DELAY_MS") {
            self.max_delay_ms = max_delay.parse()
                .context("Failed to parse MAX_DELAY_MS environment variable")?;
        }

        if let Ok(output_dir) = env::var("OUTPUT_DIR") {
            self.output_dir = output_dir;
        }

        if let Ok(csv_name) = env::var("CSV_NAME") {
            self.csv_name = csv_name;
        }

        if let Ok(tracing_level) = env::var("TRACING_LEVEL") {
            self.tracing_level = tracing_level;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.origin.trim().is_empty() {
            anyhow::bail!("origin must not be empty (set via data/config.yaml or LIANJIA_ORIGIN env var)");
        }

        if self.start_page == 0 {
            anyhow::bail!("start_page must be at least 1");
        }

        if self.start_page > self.end_page {
            anyhow::bail!(
                "start_page ({}) must not exceed end_page ({})",
                self.start_page,
                self.end_page
            );
        }

        if self.min_delay_ms > self.max_delay_ms {
            anyhow::bail!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms,
                self.max_delay_ms
            );
        }

        Ok(())
    }

    pub fn create_default() -> Result<()> {
        std::fs::create_dir_all("data")?;

        let config_str = serde_yaml::to_string(&Config::default())?;
        fs::write(CONFIG_PATH, config_str)?;
        Ok(())
    }

    pub fn throttle(&self) -> ThrottlePolicy {
        ThrottlePolicy::new(self.min_delay_ms, self.max_delay_ms)
    }

    pub fn gazetteer(&self) -> Gazetteer {
        Gazetteer::new(
            self.districts.clone(),
            self.other_district.clone(),
            self.unknown_district.clone(),
        )
    }

    pub fn csv_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(&self.csv_name)
    }

    pub fn price_chart_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join("price_analysis.html")
    }

    pub fn distribution_chart_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join("price_distribution.html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_crawl_first_three_pages() {
        let config = Config::default();
        assert_eq!(config.start_page, 1);
        assert_eq!(config.end_page, 3);
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.districts.len(), 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "end_page: 5\ncsv_name: custom.csv\n").unwrap();

        let config: Config = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.end_page, 5);
        assert_eq!(config.csv_name, "custom.csv");
        assert_eq!(config.start_page, 1);
        assert_eq!(config.origin, "https://bj.lianjia.com");
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "end_page: [not, a, number]\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_page_range() {
        let config = Config { start_page: 4, end_page: 2, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_page_zero() {
        let config = Config { start_page: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delay_bounds() {
        let config = Config { min_delay_ms: 5000, max_delay_ms: 1000, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_paths() {
        let config = Config::default();
        assert_eq!(config.csv_path(), Path::new("output").join("lianjia_rentals.csv"));
        assert_eq!(config.price_chart_path(), Path::new("output").join("price_analysis.html"));
        assert_eq!(config.distribution_chart_path(), Path::new("output").join("price_distribution.html"));
    }
}
