//! Immutable catalog snapshots.

use crate::library::entry::Entry;
use crate::library::validator::Rejection;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A candidate directory that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntry {
    /// Entry id.
    pub number: u64,
    /// Why it was excluded.
    #[serde(flatten)]
    pub reason: Rejection,
}

/// Aggregate numbers for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    /// Number of entries.
    #[serde(rename = "mangaCount")]
    pub count: usize,
    /// Sum of declared page counts.
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
    /// On-disk size of the library root.
    #[serde(rename = "dirSizeBytes")]
    pub total_bytes: u64,
    /// When the snapshot was built.
    #[serde(rename = "ts", with = "chrono::serde::ts_milliseconds")]
    pub built_at: DateTime<Utc>,
}

/// The catalog at one point in time.
///
/// Entries are sorted by ascending id; nothing mutates a snapshot once it is
/// built.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: Vec<Entry>,
    rejected: Vec<RejectedEntry>,
    total_pages: u64,
    total_bytes: u64,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Assemble a snapshot from validated entries.
    pub fn new(mut entries: Vec<Entry>, rejected: Vec<RejectedEntry>, total_bytes: u64) -> Self {
        entries.sort_by_key(|e| e.number);
        entries.dedup_by_key(|e| e.number);

        let total_pages = entries.iter().map(|e| u64::from(e.pages)).sum();

        Self {
            entries,
            rejected,
            total_pages,
            total_bytes,
            built_at: Utc::now(),
        }
    }

    /// A snapshot with no entries.
    pub fn empty(built_at: DateTime<Utc>) -> Self {
        Self {
            entries: Vec::new(),
            rejected: Vec::new(),
            total_pages: 0,
            total_bytes: 0,
            built_at,
        }
    }

    /// All entries, ascending by id.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Candidates excluded from this snapshot.
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    /// Look up an entry by id.
    pub fn get(&self, number: u64) -> Option<&Entry> {
        self.entries
            .binary_search_by_key(&number, |e| e.number)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Build time.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Aggregate numbers.
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            count: self.entries.len(),
            total_pages: self.total_pages,
            total_bytes: self.total_bytes,
            built_at: self.built_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_new_sorts_and_totals() {
        let entries = vec![
            Entry::new(30, 10, Map::new()),
            Entry::new(2, 5, Map::new()),
            Entry::new(11, 1, Map::new()),
        ];
        let snapshot = Snapshot::new(entries, Vec::new(), 4096);

        let ids: Vec<u64> = snapshot.entries().iter().map(|e| e.number).collect();
        assert_eq!(ids, vec![2, 11, 30]);

        let stats = snapshot.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.total_pages, 16);
        assert_eq!(stats.total_bytes, 4096);
    }

    #[test]
    fn test_get() {
        let snapshot = Snapshot::new(
            vec![Entry::new(1, 3, Map::new()), Entry::new(8, 4, Map::new())],
            Vec::new(),
            0,
        );

        assert_eq!(snapshot.get(8).map(|e| e.pages), Some(4));
        assert!(snapshot.get(5).is_none());
    }

    #[test]
    fn test_stats_wire_format() {
        let built_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let snapshot = Snapshot::empty(built_at);

        let value = serde_json::to_value(snapshot.stats()).unwrap();
        assert_eq!(
            value,
            json!({
                "mangaCount": 0,
                "totalPages": 0,
                "dirSizeBytes": 0,
                "ts": 1_700_000_000_123i64
            })
        );
    }

    #[test]
    fn test_rejected_wire_format() {
        let rejected = RejectedEntry {
            number: 3,
            reason: Rejection::BadMetadata("expected value".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            json!({ "number": 3, "reason": "bad_metadata", "detail": "expected value" })
        );

        let rejected = RejectedEntry {
            number: 2,
            reason: Rejection::MissingImages,
        };
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            json!({ "number": 2, "reason": "missing_images" })
        );
    }
}
