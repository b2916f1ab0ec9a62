//! Plugin lifecycle triggers for inventory sync

use sdk::types::{slug_from_file, SyncResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::InventorySync;
use crate::config::RemoteHostConfig;
use crate::inventory::PluginInventory;
use crate::trust::has_custom_update_mechanism;

/// Upgrade kind that triggers a sync
pub const UPGRADE_KIND_PLUGIN: &str = "plugin";

/// Host event that may trigger an inventory sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A plugin file was activated
    Activated(String),
    /// A plugin file was deactivated
    Deactivated(String),
    /// An upgrade finished; only `kind == "plugin"` is acted on
    Upgraded { kind: String, files: Vec<String> },
    /// Daily scheduled trigger
    Scheduled,
}

/// Maps lifecycle events onto [`InventorySync`] calls
pub struct LifecycleHandler {
    sync: InventorySync,
    inventory: Arc<dyn PluginInventory>,
}

impl LifecycleHandler {
    pub fn new(sync: InventorySync, inventory: Arc<dyn PluginInventory>) -> Self {
        Self { sync, inventory }
    }

    pub fn inventory_sync(&self) -> &InventorySync {
        &self.sync
    }

    /// Handle one event
    ///
    /// Returns `None` when the event does not lead to a sync attempt, for
    /// example a non-plugin upgrade or activation of a plugin with its own
    /// update mechanism.
    pub async fn handle(
        &self,
        event: LifecycleEvent,
        config: &RemoteHostConfig,
        now: Instant,
    ) -> Option<SyncResult> {
        match event {
            LifecycleEvent::Activated(file) => {
                let slug = self.syncable_slug(&file)?;
                let requested = [slug];
                Some(self.sync.sync(Some(&requested[..]), &[], config, now).await)
            }
            // Deactivation resends the full inventory; there is no removal call.
            LifecycleEvent::Deactivated(file) => {
                self.syncable_slug(&file)?;
                debug!("Plugin {} deactivated, resending inventory", file);
                self.full(config, now).await
            }
            LifecycleEvent::Upgraded { kind, files } => {
                if kind != UPGRADE_KIND_PLUGIN {
                    debug!("Ignoring {} upgrade", kind);
                    return None;
                }
                self.upgraded(&files, config, now).await
            }
            LifecycleEvent::Scheduled => self.full(config, now).await,
        }
    }

    /// Slug of `file` if it is installed without its own update mechanism
    fn syncable_slug(&self, file: &str) -> Option<String> {
        let Some(slug) = slug_from_file(file) else {
            debug!("Plugin {} has no slug, nothing to sync", file);
            return None;
        };

        let descriptor = match self.inventory.find(file) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Failed to read plugin inventory: {}", e);
                return None;
            }
        };

        // Unknown files are treated as using the default update mechanism.
        if descriptor.as_ref().is_some_and(has_custom_update_mechanism) {
            debug!("Plugin {} updates itself, not syncing", file);
            return None;
        }

        Some(slug.to_string())
    }

    async fn upgraded(
        &self,
        files: &[String],
        config: &RemoteHostConfig,
        now: Instant,
    ) -> Option<SyncResult> {
        let inventory = match self.inventory.plugins() {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!("Failed to read plugin inventory: {}", e);
                return None;
            }
        };

        let slugs: Vec<String> = files
            .iter()
            .filter(|file| {
                !inventory
                    .iter()
                    .any(|p| &p.file_identifier == *file && has_custom_update_mechanism(p))
            })
            .filter_map(|file| slug_from_file(file))
            .map(str::to_string)
            .collect();

        if slugs.is_empty() {
            debug!("Upgrade touched no syncable plugins");
            return None;
        }

        Some(self.sync.sync(Some(slugs.as_slice()), &inventory, config, now).await)
    }

    async fn full(&self, config: &RemoteHostConfig, now: Instant) -> Option<SyncResult> {
        match self.inventory.plugins() {
            Ok(inventory) => Some(self.sync.sync(None, &inventory, config, now).await),
            Err(e) => {
                warn!("Failed to read plugin inventory: {}", e);
                None
            }
        }
    }
}
