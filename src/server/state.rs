//! Application state shared across handlers.

use crate::config::Config;
use crate::library::{CatalogBuilder, CatalogStore};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Library catalog.
    pub store: CatalogStore,
}

impl AppState {
    /// Create state around an existing store.
    pub fn new(config: Config, store: CatalogStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Create state with a store built from the configuration.
    pub fn from_config(config: Config) -> Self {
        let store = CatalogStore::new(CatalogBuilder::from_config(&config));
        Self::new(config, store)
    }

    /// Rebuild the catalog on the blocking pool.
    pub async fn rebuild(&self) -> crate::error::Result<Arc<crate::library::Snapshot>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.rebuild()).await?
    }

    /// Start the periodic rescan task, if enabled.
    pub fn start_scheduled_rescan(&self) {
        let seconds = self.config.scan.interval_seconds;
        if seconds == 0 {
            return;
        }

        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(seconds));
            ticker.tick().await; // Skip first immediate tick

            loop {
                ticker.tick().await;
                tracing::debug!("Running scheduled library rescan");

                if let Err(e) = state.rebuild().await {
                    tracing::warn!(error = %e, "Scheduled rescan failed");
                }
            }
        });
    }
}
