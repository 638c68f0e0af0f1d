use crate::models::{Listing, COLUMNS};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Spreadsheet tools need the BOM to pick UTF-8 for the Chinese columns.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Columns that at least one listing carries, in canonical order.
pub fn present_columns(listings: &[Listing]) -> Vec<&'static str> {
    COLUMNS
        .iter()
        .copied()
        .filter(|column| listings.iter().any(|listing| listing.field(column).is_some()))
        .collect()
}

/// Writes listings as a BOM-prefixed UTF-8 CSV, replacing whatever was at `path`.
pub fn save_listings(path: &Path, listings: &[Listing]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(UTF8_BOM)?;

    let columns = present_columns(listings);
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&columns)?;

    for listing in listings {
        let row: Vec<String> = columns
            .iter()
            .map(|column| listing.field(column).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }

    writer.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Saved {} listings to {}", listings.len(), path.display());
    Ok(())
}

/// A CSV loaded back as rows of optional cells keyed by header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl Table {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Empty cells read back as absent.
    pub fn cell<'a>(row: &'a HashMap<String, String>, column: &str) -> Option<&'a str> {
        row.get(column).map(String::as_str).filter(|v| !v.is_empty())
    }
}

pub fn load_table(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", path.display()))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }

    tracing::debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(Table { headers, rows })
}
