// src/families/mod.rs
//
// Family Loader (spec.md §4.8): discovers per-family device config files,
// normalizes devices, applies the enable-map filter, and binds each
// family to its register map. Reload is periodic and idempotent;
// failures retain the prior family set (spec.md §7).

mod loader;
mod types;

pub use loader::{load_families, FamilyLoadError};
pub use types::Family;

use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::GatewayConfig;

/// Holds the currently-active family set and performs periodic reload.
/// Readers (the poller, the API) take a cheap clone of the `Arc<Family>`
/// list; reload swaps the whole set atomically under the lock so a tick
/// never sees a half-replaced family.
pub struct FamilyRegistry {
    families: RwLock<Vec<Arc<Family>>>,
    config_dir: std::path::PathBuf,
}

impl FamilyRegistry {
    pub async fn load(config: &GatewayConfig) -> Result<Self, FamilyLoadError> {
        let families = loader::load_families(&config.config_dir, config)?
            .into_iter()
            .map(Arc::new)
            .collect();
        Ok(Self {
            families: RwLock::new(families),
            config_dir: config.config_dir.clone(),
        })
    }

    pub async fn current(&self) -> Vec<Arc<Family>> {
        self.families.read().await.clone()
    }

    /// Reload from disk. On error, logs and retains the previous set.
    pub async fn reload(&self, config: &GatewayConfig) {
        match loader::load_families(&self.config_dir, config) {
            Ok(new_families) => {
                let new_families: Vec<Arc<Family>> = new_families.into_iter().map(Arc::new).collect();
                *self.families.write().await = new_families;
                tlog!("[families] reload OK");
            }
            Err(e) => {
                tlog!("[families] reload failed, retaining previous set: {}", e);
            }
        }
    }
}

pub fn config_dir_exists(dir: &Path) -> bool {
    dir.is_dir()
}
