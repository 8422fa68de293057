//! Process-wide catalog holder.

use crate::error::{AppError, Result};
use crate::library::builder::CatalogBuilder;
use crate::library::entry::Entry;
use crate::library::query::Query;
use crate::library::resolver::PageResolver;
use crate::library::snapshot::{CatalogStats, Snapshot};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Holds the active [`Snapshot`] and rebuilds it on demand.
///
/// Cloning is cheap and every clone shares the same catalog. Readers always
/// get a whole snapshot: a rebuild runs outside the lock and only the final
/// pointer replacement is done under it.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Inner>,
}

struct Inner {
    builder: CatalogBuilder,
    snapshot: RwLock<Arc<Snapshot>>,
    /// Whether a rebuild is currently running.
    scanning: AtomicBool,
    /// Whether any snapshot has been committed yet.
    initialized: AtomicBool,
}

/// Clears the scanning flag when a rebuild ends, even by panic.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CatalogStore {
    /// Create an empty store. Nothing is scanned until [`rebuild`](Self::rebuild).
    pub fn new(builder: CatalogBuilder) -> Self {
        Self {
            inner: Arc::new(Inner {
                builder,
                snapshot: RwLock::new(Arc::new(Snapshot::empty(DateTime::<Utc>::UNIX_EPOCH))),
                scanning: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Resolver for page lookups against the same root.
    pub fn resolver(&self) -> &PageResolver {
        self.inner.builder.resolver()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.read().clone()
    }

    /// All entries, ascending by id.
    pub fn list(&self) -> Vec<Entry> {
        self.snapshot().entries().to_vec()
    }

    /// Get entry by id.
    pub fn get(&self, number: u64) -> Option<Entry> {
        self.snapshot().get(number).cloned()
    }

    /// Entries matching a search query.
    pub fn search(&self, query: &str) -> Vec<Entry> {
        Query::parse(query).apply(self.snapshot().entries())
    }

    /// Entry count, totals and build time.
    pub fn stats(&self) -> CatalogStats {
        self.snapshot().stats()
    }

    /// Whether a rebuild is running right now.
    pub fn is_scanning(&self) -> bool {
        self.inner.scanning.load(Ordering::SeqCst)
    }

    /// Rescan the library root and swap in the result.
    ///
    /// Only one rebuild runs at a time; concurrent calls get
    /// [`AppError::ScanInProgress`]. If the root cannot be listed the
    /// current snapshot stays active, except on the very first build, where
    /// an empty snapshot is committed so the store has a build time.
    pub fn rebuild(&self) -> Result<Arc<Snapshot>> {
        if self.inner.scanning.swap(true, Ordering::SeqCst) {
            tracing::info!("Scan already in progress, skipping");
            return Err(AppError::ScanInProgress);
        }
        let _guard = ScanGuard(&self.inner.scanning);

        match self.inner.builder.build() {
            Ok(snapshot) => Ok(self.commit(snapshot)),
            Err(e) => {
                if !self.inner.initialized.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "Initial scan failed, starting with an empty catalog");
                    self.commit(Snapshot::empty(Utc::now()));
                } else {
                    tracing::warn!(error = %e, "Rescan failed, keeping previous catalog");
                }
                Err(e)
            }
        }
    }

    /// Mark a scan as running until the returned guard drops.
    #[cfg(test)]
    pub(crate) fn hold_scan(&self) -> impl Drop + '_ {
        assert!(!self.inner.scanning.swap(true, Ordering::SeqCst));
        ScanGuard(&self.inner.scanning)
    }

    fn commit(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.inner.snapshot.write() = snapshot.clone();
        self.inner.initialized.store(true, Ordering::SeqCst);
        snapshot
    }
}
