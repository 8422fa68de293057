//! Catalog entry model.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata fields holding lists of `{ "name": ..., "count": ... }` tags.
pub const TAG_FIELDS: [&str; 7] = [
    "tags",
    "artists",
    "characters",
    "parodies",
    "groups",
    "languages",
    "categories",
];

/// One manga/doujinshi in the library.
///
/// Serializes as a single flat JSON object: `number`, `pages` and every
/// other field of the entry's `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry id, taken from the directory name.
    pub number: u64,

    /// Declared page count.
    pub pages: u32,

    /// Remaining metadata, carried through untouched.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Entry {
    /// Create an entry from a parsed metadata record.
    ///
    /// `number` and `pages` are owned by the entry itself, so any copies of
    /// those keys in the record are dropped.
    pub fn new(number: u64, pages: u32, mut metadata: Map<String, Value>) -> Self {
        metadata.remove("number");
        metadata.remove("pages");

        Self {
            number,
            pages,
            metadata,
        }
    }

    /// Title, if the metadata has one.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }

    /// Names of all tags across every tag list.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        TAG_FIELDS
            .iter()
            .filter_map(|field| self.metadata.get(*field))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|tag| match tag {
                Value::Object(obj) => obj.get("name").and_then(Value::as_str),
                Value::String(name) => Some(name.as_str()),
                _ => None,
            })
    }

    /// Upload date from `datetime_iso8601`.
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.metadata
            .get("datetime_iso8601")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }
}
