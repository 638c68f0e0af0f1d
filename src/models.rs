/// Separator used when several description fragments land in one field,
/// and when tags are flattened into a single CSV cell.
pub const FIELD_SEPARATOR: &str = "|";

/// One crawled rental listing. Created once while parsing a page and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub title: String,
    pub link: Option<String>,
    /// Monthly rent. 0 marks a price element whose text could not be parsed.
    pub price: u64,
    pub price_range: Option<String>,
    pub full_description: Option<String>,
    pub area: Option<String>,
    pub layout: Option<String>,
    pub floor: Option<String>,
    pub orientation: Option<String>,
    pub location: Option<String>,
    pub region: Option<String>,
    pub tags: Vec<String>,
}

/// Column order used when writing listings out.
pub const COLUMNS: [&str; 12] = [
    "title",
    "link",
    "price",
    "price_range",
    "full_description",
    "area",
    "layout",
    "floor",
    "orientation",
    "location",
    "region",
    "tags",
];

impl Listing {
    /// Value of a named column, or `None` when the source markup had no such field.
    pub fn field(&self, column: &str) -> Option<String> {
        match column {
            "title" => Some(self.title.clone()),
            "link" => self.link.clone(),
            "price" => Some(self.price.to_string()),
            "price_range" => self.price_range.clone(),
            "full_description" => self.full_description.clone(),
            "area" => self.area.clone(),
            "layout" => self.layout.clone(),
            "floor" => self.floor.clone(),
            "orientation" => self.orientation.clone(),
            "location" => self.location.clone(),
            "region" => self.region.clone(),
            "tags" if !self.tags.is_empty() => Some(self.tags.join(FIELD_SEPARATOR)),
            _ => None,
        }
    }

    /// Short label for logs; titles are truncated on character boundaries.
    pub fn short_title(&self, max_chars: usize) -> String {
        truncate_chars(&self.title, max_chars)
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
