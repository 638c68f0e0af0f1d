use crate::models::truncate_chars;
use crate::storage::{self, Table};
use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Characters of a title kept as a chart label.
pub const CHART_LABEL_CHARS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceBucket {
    Under2000,
    From2000To3999,
    From4000To5999,
    From6000To7999,
    From8000To9999,
    From10000,
}

pub const BUCKETS: [PriceBucket; 6] = [
    PriceBucket::Under2000,
    PriceBucket::From2000To3999,
    PriceBucket::From4000To5999,
    PriceBucket::From6000To7999,
    PriceBucket::From8000To9999,
    PriceBucket::From10000,
];

impl PriceBucket {
    /// Lower bound inclusive, upper bound exclusive.
    pub fn bounds(&self) -> (u64, Option<u64>) {
        match self {
            PriceBucket::Under2000 => (0, Some(2000)),
            PriceBucket::From2000To3999 => (2000, Some(4000)),
            PriceBucket::From4000To5999 => (4000, Some(6000)),
            PriceBucket::From6000To7999 => (6000, Some(8000)),
            PriceBucket::From8000To9999 => (8000, Some(10000)),
            PriceBucket::From10000 => (10000, None),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PriceBucket::Under2000 => "2000元以下",
            PriceBucket::From2000To3999 => "2000-4000元",
            PriceBucket::From4000To5999 => "4000-6000元",
            PriceBucket::From6000To7999 => "6000-8000元",
            PriceBucket::From8000To9999 => "8000-10000元",
            PriceBucket::From10000 => "10000元以上",
        }
    }

    pub fn for_price(price: u64) -> Self {
        BUCKETS
            .iter()
            .copied()
            .find(|bucket| match bucket.bounds() {
                (low, Some(high)) => price >= low && price < high,
                (low, None) => price >= low,
            })
            .unwrap_or(PriceBucket::From10000)
    }
}

/// Ordered list of district names matched against location text.
#[derive(Debug, Clone, PartialEq)]
pub struct Gazetteer {
    districts: Vec<String>,
    other: String,
    unknown: String,
}

impl Gazetteer {
    pub fn new(districts: Vec<String>, other: String, unknown: String) -> Self {
        Self { districts, other, unknown }
    }

    /// First district contained in the text wins. Text matching nothing is
    /// "other"; a missing location is "unknown".
    pub fn classify(&self, location: Option<&str>) -> &str {
        let Some(text) = location else {
            return &self.unknown;
        };
        self.districts
            .iter()
            .find(|district| text.contains(district.as_str()))
            .map(String::as_str)
            .unwrap_or(&self.other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub title: String,
    pub price: u64,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: u64,
    pub max: u64,
}

impl PriceSummary {
    pub fn from_prices(prices: &[u64]) -> Option<Self> {
        if prices.is_empty() {
            return None;
        }

        let mut sorted = prices.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let mean = mean_price(&sorted);
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] as f64 + sorted[count / 2] as f64) / 2.0
        } else {
            sorted[count / 2] as f64
        };

        Some(Self {
            count,
            mean,
            median,
            min: sorted[0],
            max: sorted[count - 1],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketCount {
    pub bucket: PriceBucket,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictStat {
    pub district: String,
    pub count: usize,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub loaded: usize,
    pub cleaned: usize,
    pub summary: Option<PriceSummary>,
    /// One entry per bucket, in bucket order, including empty ones.
    pub histogram: Vec<BucketCount>,
    /// `None` when the data has no location column.
    pub districts: Option<Vec<DistrictStat>>,
}

pub struct Analyzer {
    rows: Vec<PriceRow>,
    loaded: usize,
    has_location: bool,
    gazetteer: Gazetteer,
}

impl Analyzer {
    pub fn load(path: &Path, gazetteer: Gazetteer) -> Result<Self> {
        let table = storage::load_table(path)?;
        let analyzer = Self::from_table(&table, gazetteer);
        tracing::info!(
            "Loaded {} rows from {}, {} after cleaning",
            analyzer.loaded,
            path.display(),
            analyzer.rows.len()
        );
        Ok(analyzer)
    }

    /// Keeps only rows with a positive, parseable price.
    pub fn from_table(table: &Table, gazetteer: Gazetteer) -> Self {
        let rows = table
            .rows
            .iter()
            .filter_map(|row| {
                let price = Table::cell(row, "price")?.trim().parse::<u64>().ok()?;
                if price == 0 {
                    return None;
                }
                Some(PriceRow {
                    title: Table::cell(row, "title").unwrap_or_default().to_string(),
                    price,
                    location: Table::cell(row, "location").map(str::to_string),
                })
            })
            .collect();

        Self {
            rows,
            loaded: table.rows.len(),
            has_location: table.has_column("location"),
            gazetteer,
        }
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn histogram(&self) -> Vec<BucketCount> {
        let total = self.rows.len();
        let mut counts: HashMap<PriceBucket, usize> = HashMap::new();
        for row in &self.rows {
            *counts.entry(PriceBucket::for_price(row.price)).or_default() += 1;
        }

        BUCKETS
            .iter()
            .map(|&bucket| {
                let count = counts.get(&bucket).copied().unwrap_or(0);
                let percentage = if total == 0 { 0.0 } else { count as f64 / total as f64 * 100.0 };
                BucketCount { bucket, count, percentage }
            })
            .collect()
    }

    pub fn district_stats(&self) -> Option<Vec<DistrictStat>> {
        if !self.has_location {
            return None;
        }

        let mut groups: HashMap<&str, Vec<u64>> = HashMap::new();
        for row in &self.rows {
            let district = self.gazetteer.classify(row.location.as_deref());
            groups.entry(district).or_default().push(row.price);
        }

        let mut stats: Vec<DistrictStat> = groups
            .into_iter()
            .map(|(district, prices)| DistrictStat {
                district: district.to_string(),
                count: prices.len(),
                mean: mean_price(&prices),
                min: prices.iter().copied().min().unwrap_or(0),
                max: prices.iter().copied().max().unwrap_or(0),
            })
            .collect();

        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.district.cmp(&b.district)));
        Some(stats)
    }

    /// Highest-priced listings, labels truncated for the chart axis.
    /// Equal prices keep their file order.
    pub fn top_by_price(&self, n: usize) -> Vec<(String, u64)> {
        let mut rows: Vec<&PriceRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| b.price.cmp(&a.price));
        rows.into_iter()
            .take(n)
            .map(|row| (truncate_chars(&row.title, CHART_LABEL_CHARS), row.price))
            .collect()
    }

    /// Non-empty buckets as (label, count) pairs for the distribution chart.
    pub fn distribution(&self) -> Vec<(String, usize)> {
        self.histogram()
            .into_iter()
            .filter(|b| b.count > 0)
            .map(|b| (b.bucket.label().to_string(), b.count))
            .collect()
    }

    pub fn report(&self) -> AnalysisReport {
        let prices: Vec<u64> = self.rows.iter().map(|row| row.price).collect();
        AnalysisReport {
            loaded: self.loaded,
            cleaned: self.rows.len(),
            summary: PriceSummary::from_prices(&prices),
            histogram: self.histogram(),
            districts: self.district_stats(),
        }
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== 基础统计分析 ===")?;
        writeln!(f, "加载记录: {} 条, 清洗后: {} 条", self.loaded, self.cleaned)?;

        match &self.summary {
            Some(summary) => {
                writeln!(f, "房源数量: {}", summary.count)?;
                writeln!(f, "平均价格: {:.0} 元/月", summary.mean)?;
                writeln!(f, "价格中位数: {} 元/月", summary.median)?;
                writeln!(f, "最高价格: {} 元/月", summary.max)?;
                writeln!(f, "最低价格: {} 元/月", summary.min)?;
            }
            None => writeln!(f, "没有有效的价格数据")?,
        }

        writeln!(f, "\n价格分布:")?;
        for bucket in self.histogram.iter().filter(|b| b.count > 0) {
            writeln!(f, "  {}: {}套 ({:.1}%)", bucket.bucket.label(), bucket.count, bucket.percentage)?;
        }

        if let Some(districts) = &self.districts {
            writeln!(f, "\n=== 区域分析 ===")?;
            for stat in districts {
                writeln!(f, "  {}: {}套, 均价{:.0}元", stat.district, stat.count, stat.mean)?;
            }
        }

        Ok(())
    }
}

/// Mean of `prices`, summed wide enough that no run of `u64` prices overflows.
/// An empty slice gives 0.
pub fn mean_price(prices: &[u64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let total: u128 = prices.iter().map(|&p| u128::from(p)).sum();
    total as f64 / prices.len() as f64
}

/// `13000` → `1.3万元/月`, `3500` → `3500元/月`.
pub fn format_price(price: f64) -> String {
    if price >= 10000.0 {
        format!("{:.1}万元/月", price / 10000.0)
    } else {
        format!("{:.0}元/月", price)
    }
}

/// Numeric square metres from an area fragment such as `58.00㎡`.
pub fn area_sqm(text: &str) -> Option<f64> {
    let area_regex = Regex::new(r"(\d+\.?\d*)\s*㎡").ok()?;
    area_regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
