//! Activity log collaborator
//!
//! Engine operations report what they did as `(timestamp, action, result,
//! message)` tuples. Recording never fails from the caller's point of view:
//! a backend that cannot persist an entry logs a warning and moves on.

use async_trait::async_trait;
use sdk::errors::UpdateError;
use sdk::types::{ActivityEntry, ActivityResult};
use std::sync::Mutex;

/// Inventory sync POST
pub const ACTION_SEND_PLUGINS: &str = "send_plugins";

/// Interactive connection test
pub const ACTION_TEST_CONNECTION: &str = "test_connection";

/// Secure update indicator lookup
pub const ACTION_PLUGIN_INFORMATION: &str = "plugin_information";

/// Package checksum verification
pub const ACTION_VERIFY_PACKAGE: &str = "verify_package";

/// Number of entries shown by the log listing
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Sink for activity entries
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Record one entry
    async fn record(&self, entry: ActivityEntry);

    /// Most recent entries, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, UpdateError>;
}

/// Activity log that only emits `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActivityLog;

#[async_trait]
impl ActivityLog for TracingActivityLog {
    async fn record(&self, entry: ActivityEntry) {
        match entry.result {
            ActivityResult::Failure => tracing::warn!(
                action = %entry.action,
                result = %entry.result,
                "{}",
                entry.message
            ),
            _ => tracing::info!(
                action = %entry.action,
                result = %entry.result,
                "{}",
                entry.message
            ),
        }
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<ActivityEntry>, UpdateError> {
        Ok(Vec::new())
    }
}

/// In-memory activity log
#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, oldest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn record(&self, entry: ActivityEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, UpdateError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
