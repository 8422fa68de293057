//! Per-entry validation.

use crate::library::entry::Entry;
use crate::library::resolver::PageResolver;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Why a candidate directory was left out of the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    /// `meta.json` is missing, unreadable or malformed.
    #[error("bad metadata: {0}")]
    BadMetadata(String),

    /// The declared page count is missing or not positive.
    #[error("empty")]
    Empty,

    /// Page 1 does not exist in any supported format.
    #[error("missing images")]
    MissingImages,
}

/// Validate a candidate entry and build its catalog record.
pub fn validate(resolver: &PageResolver, number: u64) -> Result<Entry, Rejection> {
    let path = resolver.metadata_path(number);

    let raw = std::fs::read(&path).map_err(|e| Rejection::BadMetadata(e.to_string()))?;
    let record: Map<String, Value> = match serde_json::from_slice(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(Rejection::BadMetadata(
                "metadata is not a JSON object".to_string(),
            ));
        }
        Err(e) => return Err(Rejection::BadMetadata(e.to_string())),
    };

    let pages = page_count(record.get("pages"))?;

    if resolver.resolve(number, 1).is_none() {
        return Err(Rejection::MissingImages);
    }

    Ok(Entry::new(number, pages, record))
}

/// Interpret the `pages` field of a metadata record.
fn page_count(value: Option<&Value>) -> Result<u32, Rejection> {
    match value {
        None | Some(Value::Null) => Err(Rejection::Empty),
        Some(Value::Number(n)) => number_to_pages(n),
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(n) if n > 0 => u32::try_from(n).map_err(|_| out_of_range()),
            Ok(_) => Err(Rejection::Empty),
            Err(_) => Err(Rejection::BadMetadata(format!(
                "page count is not a number: {:?}",
                s
            ))),
        },
        Some(other) => Err(Rejection::BadMetadata(format!(
            "page count is not a number: {}",
            other
        ))),
    }
}

fn number_to_pages(n: &Number) -> Result<u32, Rejection> {
    if let Some(pages) = n.as_u64() {
        if pages == 0 {
            return Err(Rejection::Empty);
        }
        return u32::try_from(pages).map_err(|_| out_of_range());
    }

    if n.as_i64().is_some() {
        return Err(Rejection::Empty);
    }

    match n.as_f64() {
        Some(f) if f <= 0.0 => Err(Rejection::Empty),
        Some(f) if f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(Rejection::BadMetadata(format!(
            "page count is not a whole number: {}",
            n
        ))),
    }
}

fn out_of_range() -> Rejection {
    Rejection::BadMetadata("page count out of range".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{write_meta, write_page};

    #[test]
    fn test_accepts_valid_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), 5, r#"{"pages": 12, "title": "Valid"}"#);
        write_page(dir.path(), 5, 1, "png");

        let entry = validate(&PageResolver::new(dir.path()), 5).unwrap();
        assert_eq!(entry.number, 5);
        assert_eq!(entry.pages, 12);
        assert_eq!(entry.title(), Some("Valid"));
    }

    #[test]
    fn test_rejects_missing_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), 5, 1, "jpg");

        let err = validate(&PageResolver::new(dir.path()), 5).unwrap_err();
        assert!(matches!(err, Rejection::BadMetadata(_)));
    }

    #[test]
    fn test_rejects_malformed_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), 5, "{ not json");
        write_page(dir.path(), 5, 1, "jpg");

        let err = validate(&PageResolver::new(dir.path()), 5).unwrap_err();
        assert!(matches!(err, Rejection::BadMetadata(_)));

        write_meta(dir.path(), 5, "[1, 2, 3]");
        let err = validate(&PageResolver::new(dir.path()), 5).unwrap_err();
        assert_eq!(
            err,
            Rejection::BadMetadata("metadata is not a JSON object".to_string())
        );
    }

    #[test]
    fn test_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), 5, 1, "jpg");
        let resolver = PageResolver::new(dir.path());

        for meta in [
            r#"{"title": "no pages"}"#,
            r#"{"pages": null}"#,
            r#"{"pages": 0}"#,
            r#"{"pages": -3}"#,
            r#"{"pages": "0"}"#,
        ] {
            write_meta(dir.path(), 5, meta);
            assert_eq!(validate(&resolver, 5).unwrap_err(), Rejection::Empty, "{}", meta);
        }
    }

    #[test]
    fn test_rejects_non_numeric_pages() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), 5, 1, "jpg");
        let resolver = PageResolver::new(dir.path());

        for meta in [
            r#"{"pages": "many"}"#,
            r#"{"pages": [1]}"#,
            r#"{"pages": 2.5}"#,
        ] {
            write_meta(dir.path(), 5, meta);
            assert!(
                matches!(validate(&resolver, 5), Err(Rejection::BadMetadata(_))),
                "{}",
                meta
            );
        }
    }

    #[test]
    fn test_accepts_numeric_string_and_whole_float() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), 5, 1, "jpg");
        let resolver = PageResolver::new(dir.path());

        write_meta(dir.path(), 5, r#"{"pages": "8"}"#);
        assert_eq!(validate(&resolver, 5).unwrap().pages, 8);

        write_meta(dir.path(), 5, r#"{"pages": 8.0}"#);
        assert_eq!(validate(&resolver, 5).unwrap().pages, 8);
    }

    #[test]
    fn test_rejects_missing_first_page() {
        let dir = tempfile::tempdir().unwrap();
        write_meta(dir.path(), 2, r#"{"pages": 5}"#);
        write_page(dir.path(), 2, 2, "jpg");

        let err = validate(&PageResolver::new(dir.path()), 2).unwrap_err();
        assert_eq!(err, Rejection::MissingImages);
        assert_eq!(err.to_string(), "missing images");
    }
}
