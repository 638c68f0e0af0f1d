use anyhow::{Context, Result};
use chrono::Local;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

const ECHARTS_CDN: &str = "https://assets.pyecharts.org/assets/v5/echarts.min.js";

/// Anything that can turn labelled values into a chart file.
pub trait ChartRenderer {
    fn bar(&self, title: &str, series: &str, points: &[(String, u64)], path: &Path) -> Result<()>;

    fn pie(&self, title: &str, slices: &[(String, usize)], path: &Path) -> Result<()>;
}

/// Self-contained HTML pages driven by an embedded ECharts option object.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchartsHtml;

impl EchartsHtml {
    pub fn bar_option(title: &str, series: &str, points: &[(String, u64)]) -> Value {
        let labels: Vec<&str> = points.iter().map(|(label, _)| label.as_str()).collect();
        let values: Vec<u64> = points.iter().map(|(_, value)| *value).collect();

        json!({
            "title": { "text": title },
            "tooltip": { "trigger": "axis" },
            "legend": { "data": [series] },
            "xAxis": {
                "type": "category",
                "data": labels,
                "axisLabel": { "rotate": 45, "interval": 0 }
            },
            "yAxis": { "type": "value", "name": series },
            "grid": { "bottom": 160 },
            "series": [{ "name": series, "type": "bar", "data": values }]
        })
    }

    pub fn pie_option(title: &str, slices: &[(String, usize)]) -> Value {
        let data: Vec<Value> = slices
            .iter()
            .map(|(name, count)| json!({ "name": name, "value": count }))
            .collect();

        json!({
            "title": { "text": title },
            "tooltip": { "trigger": "item" },
            "legend": { "top": "bottom" },
            "series": [{
                "type": "pie",
                "radius": "60%",
                "data": data,
                "label": { "formatter": "{b}: {c} ({d}%)" }
            }]
        })
    }

    fn page(title: &str, option: &Value) -> Markup {
        // keep "</script>" inside labels from closing the script element
        let option_json = option.to_string().replace("</", "<\\/");
        let script = format!(
            "var chart = echarts.init(document.getElementById('chart'));\nchart.setOption({});",
            option_json
        );

        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8";
                    title { (title) }
                    script type="text/javascript" src=(ECHARTS_CDN) {}
                }
                body {
                    div #chart style="width:900px;height:500px;" {}
                    p style="color:#888;font-size:12px;" {
                        "生成时间: " (Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
                    }
                    script type="text/javascript" { (PreEscaped(script)) }
                }
            }
        }
    }

    fn write(path: &Path, markup: Markup) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, markup.into_string())
            .with_context(|| format!("Failed to write chart {}", path.display()))?;
        tracing::info!("Chart written to {}", path.display());
        Ok(())
    }
}

impl ChartRenderer for EchartsHtml {
    fn bar(&self, title: &str, series: &str, points: &[(String, u64)], path: &Path) -> Result<()> {
        let option = Self::bar_option(title, series, points);
        Self::write(path, Self::page(title, &option))
    }

    fn pie(&self, title: &str, slices: &[(String, usize)], path: &Path) -> Result<()> {
        let option = Self::pie_option(title, slices);
        Self::write(path, Self::page(title, &option))
    }
}
