//! Catalog construction from the library root.

use crate::config::Config;
use crate::error::Result;
use crate::library::entry::Entry;
use crate::library::resolver::PageResolver;
use crate::library::snapshot::{RejectedEntry, Snapshot};
use crate::library::validator::{self, Rejection};
use rayon::prelude::*;
use std::path::Path;

/// Scans the library root into fresh [`Snapshot`]s.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    resolver: PageResolver,
    workers: usize,
    compute_size: bool,
}

impl CatalogBuilder {
    /// Create a builder with sequential validation and size aggregation on.
    pub fn new(resolver: PageResolver) -> Self {
        Self {
            resolver,
            workers: 1,
            compute_size: true,
        }
    }

    /// Create a builder from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(PageResolver::new(&config.library.root))
            .with_workers(config.scan.workers)
            .with_compute_size(config.scan.compute_size)
    }

    /// Number of threads validating entries.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Whether to sum file sizes under the root on every build.
    pub fn with_compute_size(mut self, compute_size: bool) -> Self {
        self.compute_size = compute_size;
        self
    }

    /// Resolver shared with everything that reads pages.
    pub fn resolver(&self) -> &PageResolver {
        &self.resolver
    }

    /// Build a new snapshot.
    ///
    /// Fails only when the root directory itself cannot be listed; broken
    /// entries are recorded as rejections instead.
    pub fn build(&self) -> Result<Snapshot> {
        let start = std::time::Instant::now();
        let root = self.resolver.root();

        if let Err(e) = std::fs::create_dir_all(root) {
            tracing::warn!(root = %root.display(), error = %e, "Failed to create library root");
        }

        let candidates = enumerate_candidates(root).inspect_err(|e| {
            tracing::error!(root = %root.display(), error = %e, "Failed to read library root");
        })?;

        tracing::info!(
            candidates = candidates.len(),
            workers = self.workers,
            "Validating entries"
        );

        let results = self.validate_all(&candidates);

        let mut entries = Vec::with_capacity(results.len());
        let mut rejected = Vec::new();
        for (number, result) in results {
            match result {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    tracing::warn!(number, reason = %reason, "Skipping entry");
                    rejected.push(RejectedEntry { number, reason });
                }
            }
        }

        let total_bytes = if self.compute_size {
            directory_size(root)
        } else {
            0
        };

        let snapshot = Snapshot::new(entries, rejected, total_bytes);
        let stats = snapshot.stats();

        tracing::info!(
            entries = stats.count,
            rejected = snapshot.rejected().len(),
            total_pages = stats.total_pages,
            total_bytes = stats.total_bytes,
            elapsed = ?start.elapsed(),
            "Catalog built"
        );

        Ok(snapshot)
    }

    /// Validate candidates, keeping their input order.
    fn validate_all(&self, candidates: &[u64]) -> Vec<(u64, std::result::Result<Entry, Rejection>)> {
        let validate = |&number: &u64| (number, validator::validate(&self.resolver, number));

        if self.workers <= 1 {
            return candidates.iter().map(validate).collect();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| candidates.par_iter().map(validate).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start scan workers, validating sequentially");
                candidates.iter().map(validate).collect()
            }
        }
    }
}

/// List entry ids under `root`, ascending.
///
/// Only directories named with a canonical positive decimal number count;
/// files, other names and zero-padded names are ignored.
pub fn enumerate_candidates(root: &Path) -> std::io::Result<Vec<u64>> {
    let mut ids: Vec<u64> = std::fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().and_then(parse_entry_id))
        .collect();

    ids.sort_unstable();
    Ok(ids)
}

/// Parse a directory name as an entry id.
pub fn parse_entry_id(name: &str) -> Option<u64> {
    if name.is_empty() || name.starts_with('0') || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Total size in bytes of every file under `root`.
///
/// Best effort: anything that cannot be listed or stat'ed is logged and
/// counted as zero.
pub fn directory_size(root: &Path) -> u64 {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read directory entry");
                None
            }
        })
        .filter(|e| !e.file_type().is_dir())
        .map(|e| match std::fs::metadata(e.path()) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                tracing::warn!(path = %e.path().display(), error = %err, "Failed to stat file");
                0
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{write_meta, write_page, write_valid_entry};

    #[test]
    fn test_parse_entry_id() {
        assert_eq!(parse_entry_id("1"), Some(1));
        assert_eq!(parse_entry_id("177013"), Some(177013));
        assert_eq!(parse_entry_id("abc"), None);
        assert_eq!(parse_entry_id("12a"), None);
        assert_eq!(parse_entry_id("-4"), None);
        assert_eq!(parse_entry_id("0"), None);
        assert_eq!(parse_entry_id("007"), None);
        assert_eq!(parse_entry_id(""), None);
        assert_eq!(parse_entry_id("99999999999999999999999"), None);
    }

    #[test]
    fn test_enumerate_candidates_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10", "2", "abc", "1", "05"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("3"), b"not a directory").unwrap();

        let ids = enumerate_candidates(dir.path()).unwrap();
        assert_eq!(ids, vec![1, 2, 10]);
    }

    #[test]
    fn test_build_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");

        let snapshot = CatalogBuilder::new(PageResolver::new(&root)).build().unwrap();
        assert!(root.is_dir());
        assert!(snapshot.entries().is_empty());
    }

    #[test]
    fn test_build_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("library");
        std::fs::write(&root, b"oops").unwrap();

        assert!(CatalogBuilder::new(PageResolver::new(&root)).build().is_err());
    }

    #[test]
    fn test_build_records_rejections() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_entry(dir.path(), 1, 3);
        write_meta(dir.path(), 2, r#"{"pages": 5}"#);
        write_meta(dir.path(), 3, "{{{");
        write_page(dir.path(), 3, 1, "jpg");

        let snapshot = CatalogBuilder::new(PageResolver::new(dir.path()))
            .build()
            .unwrap();

        let ids: Vec<u64> = snapshot.entries().iter().map(|e| e.number).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(snapshot.stats().total_pages, 3);

        let rejected = snapshot.rejected();
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].number, 2);
        assert_eq!(rejected[0].reason, Rejection::MissingImages);
        assert_eq!(rejected[1].number, 3);
        assert!(matches!(rejected[1].reason, Rejection::BadMetadata(_)));
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        for id in 1..=40 {
            if id % 7 == 0 {
                write_meta(dir.path(), id, r#"{"pages": 0}"#);
            } else {
                write_valid_entry(dir.path(), id, (id % 5 + 1) as u32);
            }
        }

        let resolver = PageResolver::new(dir.path());
        let sequential = CatalogBuilder::new(resolver.clone()).build().unwrap();
        let parallel = CatalogBuilder::new(resolver)
            .with_workers(4)
            .build()
            .unwrap();

        assert_eq!(sequential.entries(), parallel.entries());
        assert_eq!(sequential.rejected(), parallel.rejected());
        assert_eq!(parallel.entries().len(), 35);
    }

    #[test]
    fn test_compute_size_toggle() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_entry(dir.path(), 1, 2);

        let resolver = PageResolver::new(dir.path());
        let with_size = CatalogBuilder::new(resolver.clone()).build().unwrap();
        assert!(with_size.stats().total_bytes > 0);

        let without_size = CatalogBuilder::new(resolver)
            .with_compute_size(false)
            .build()
            .unwrap();
        assert_eq!(without_size.stats().total_bytes, 0);
    }

    #[test]
    fn test_directory_size_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a").join("b")).unwrap();
        std::fs::write(dir.path().join("top.bin"), vec![0u8; 100]).unwrap();
        std::fs::write(dir.path().join("a").join("mid.bin"), vec![0u8; 20]).unwrap();
        std::fs::write(dir.path().join("a").join("b").join("deep.bin"), vec![0u8; 3]).unwrap();

        assert_eq!(directory_size(dir.path()), 123);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_size_skips_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("{}.bin", i)), vec![0u8; 10]).unwrap();
        }
        std::os::unix::fs::symlink(
            dir.path().join("does-not-exist"),
            dir.path().join("dangling.bin"),
        )
        .unwrap();

        assert_eq!(directory_size(dir.path()), 100);
    }
}
