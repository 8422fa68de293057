//! Page image lookup.

use crate::config::PageFormat;
use std::path::{Path, PathBuf};

/// Name of the per-entry metadata record.
pub const METADATA_FILE: &str = "meta.json";

/// A page image found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    /// 1-based page number.
    pub number: u32,
    /// Full path to the image.
    pub path: PathBuf,
    /// Format matched by extension.
    pub format: PageFormat,
}

impl ResolvedPage {
    /// File name as stored on disk, e.g. `3.png`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.number, self.format.extension())
    }
}

/// Maps `(entry id, page number)` to an image under the library root.
///
/// Extensions are tried in [`PageFormat::PRECEDENCE`] order, so every
/// caller sees the same file for the same page.
#[derive(Debug, Clone)]
pub struct PageResolver {
    root: PathBuf,
}

impl PageResolver {
    /// Create a resolver for a library root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Library root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a single entry.
    pub fn entry_dir(&self, number: u64) -> PathBuf {
        self.root.join(number.to_string())
    }

    /// Path to an entry's `meta.json`.
    pub fn metadata_path(&self, number: u64) -> PathBuf {
        self.entry_dir(number).join(METADATA_FILE)
    }

    /// Find a page image, or `None` if no supported extension exists.
    pub fn resolve(&self, number: u64, page: u32) -> Option<ResolvedPage> {
        let dir = self.entry_dir(number);

        PageFormat::PRECEDENCE.iter().find_map(|format| {
            let path = dir.join(format!("{}.{}", page, format.extension()));
            path.is_file().then(|| ResolvedPage {
                number: page,
                path,
                format: *format,
            })
        })
    }

    /// Resolve pages `1..=page_count` in order, skipping missing ones.
    pub fn resolve_all(&self, number: u64, page_count: u32) -> Vec<ResolvedPage> {
        (1..=page_count)
            .filter_map(|page| {
                let resolved = self.resolve(number, page);
                if resolved.is_none() {
                    tracing::debug!(number, page, "Page not found on disk");
                }
                resolved
            })
            .collect()
    }
}
