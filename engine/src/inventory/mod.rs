//! Installed plugin inventory
//!
//! The host owns the list of installed plugins; the engine reads it on
//! demand through [`PluginInventory`].

use sdk::errors::UpdateError;
use sdk::types::PluginDescriptor;
use std::path::{Path, PathBuf};

/// Source of the installed plugin listing
pub trait PluginInventory: Send + Sync {
    /// All installed plugins
    fn plugins(&self) -> Result<Vec<PluginDescriptor>, UpdateError>;

    /// Descriptor for one plugin file, if installed
    fn find(&self, file_identifier: &str) -> Result<Option<PluginDescriptor>, UpdateError> {
        Ok(self
            .plugins()?
            .into_iter()
            .find(|p| p.file_identifier == file_identifier))
    }
}

impl PluginInventory for Vec<PluginDescriptor> {
    fn plugins(&self) -> Result<Vec<PluginDescriptor>, UpdateError> {
        Ok(self.clone())
    }
}

/// Inventory read from a JSON array of descriptors, re-read on every call
#[derive(Debug, Clone)]
pub struct JsonInventory {
    path: PathBuf,
}

impl JsonInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PluginInventory for JsonInventory {
    fn plugins(&self) -> Result<Vec<PluginDescriptor>, UpdateError> {
        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            UpdateError::Config(format!(
                "Failed to parse plugin inventory {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}
