//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::sync::SyncHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    hub: SyncHub,
}

impl AppState {
    /// Create application state with a fresh document seeded from the config
    pub fn new(config: Config) -> Self {
        let hub = SyncHub::new(config.document.seed.clone());
        Self::with_hub(config, hub)
    }

    /// Create application state around an existing hub
    pub fn with_hub(config: Config, hub: SyncHub) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, hub }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the sync hub
    pub fn hub(&self) -> &SyncHub {
        &self.inner.hub
    }
}
