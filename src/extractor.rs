//! Classifies the `|`-separated fragments of a listing description into named fields.
//!
//! Rules are evaluated top-down per fragment and the first match wins, so the
//! order of [`RULES`] is part of the behaviour: a fragment such as `高楼层/南`
//! is a floor, never an orientation.

use crate::models::FIELD_SEPARATOR;

const AREA_MARKER: char = '㎡';
const ROOM_MARKER: char = '室';
const HALL_MARKER: char = '厅';
const FLOOR_MARKER: char = '层';
const DIRECTION_MARKERS: [char; 4] = ['东', '南', '西', '北'];

const ALL_MARKERS: [char; 8] = [
    AREA_MARKER, ROOM_MARKER, HALL_MARKER, FLOOR_MARKER,
    '东', '南', '西', '北',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Area,
    Layout,
    Floor,
    Orientation,
    Location,
}

pub struct Rule {
    pub field: Field,
    pub matches: fn(&str) -> bool,
}

fn is_area(fragment: &str) -> bool {
    fragment.contains(AREA_MARKER)
}

fn is_layout(fragment: &str) -> bool {
    fragment.contains(ROOM_MARKER) && fragment.contains(HALL_MARKER)
}

fn is_floor(fragment: &str) -> bool {
    fragment.contains(FLOOR_MARKER)
}

fn is_orientation(fragment: &str) -> bool {
    fragment.contains(&DIRECTION_MARKERS[..])
}

/// Catch-all for location text. A fragment carrying a lone room or hall
/// marker falls through every rule and is dropped.
fn is_location(fragment: &str) -> bool {
    !fragment.contains(&ALL_MARKERS[..])
}

pub const RULES: [Rule; 5] = [
    Rule { field: Field::Area, matches: is_area },
    Rule { field: Field::Layout, matches: is_layout },
    Rule { field: Field::Floor, matches: is_floor },
    Rule { field: Field::Orientation, matches: is_orientation },
    Rule { field: Field::Location, matches: is_location },
];

pub fn classify(fragment: &str) -> Option<Field> {
    RULES.iter()
        .find(|rule| (rule.matches)(fragment))
        .map(|rule| rule.field)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub area: Option<String>,
    pub layout: Option<String>,
    pub floor: Option<String>,
    pub orientation: Option<String>,
    pub location: Option<String>,
}

impl ExtractedFields {
    fn assign(&mut self, field: Field, fragment: &str) {
        let value = fragment.to_string();
        match field {
            Field::Area => self.area = Some(value),
            Field::Layout => self.layout = Some(value),
            Field::Floor => self.floor = Some(value),
            Field::Orientation => self.orientation = Some(value),
            // TODO: decide whether multi-part locations should stay concatenated or keep only the first part
            Field::Location => {
                if let Some(existing) = self.location.as_mut() {
                    existing.push_str(FIELD_SEPARATOR);
                    existing.push_str(fragment);
                } else {
                    self.location = Some(value);
                }
            }
        }
    }
}

/// Splits a description on `|` and assigns each trimmed, non-empty fragment to its field.
pub fn extract_fields(description: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::default();

    for fragment in description.split(FIELD_SEPARATOR) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }

        match classify(fragment) {
            Some(field) => fields.assign(field, fragment),
            None => tracing::trace!("Dropping unclassified fragment '{}'", fragment),
        }
    }

    fields
}
