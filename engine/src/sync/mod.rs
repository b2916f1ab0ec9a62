//! Inventory synchronization
//!
//! Reconciles the set of installed, registry-hosted plugin slugs with the
//! update host. A sync is opportunistic: it runs on lifecycle events and a
//! daily trigger the user did not directly initiate, so a remote failure is
//! logged and reported in the [`SyncResult`] but never returned as an error.
//!
//! Preconditions, in order:
//! 1. Host enabled with URL and API key, otherwise a silent no-op
//! 2. Sync-tier cooldown, otherwise suppressed without a network call
//!
//! Then exactly one authenticated POST carries the slug set.

use sdk::types::{ActivityEntry, ActivityResult, PluginDescriptor, SkipReason, SyncResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::activity_log::{ActivityLog, ACTION_SEND_PLUGINS};
use crate::config::RemoteHostConfig;
use crate::rate_limiter::{RateGate, RateTier};
use crate::remote::RemoteHost;
use crate::secrets::scrub;
use crate::trust::has_custom_update_mechanism;

pub mod lifecycle;

pub use lifecycle::{LifecycleEvent, LifecycleHandler};

/// Slugs of every installed plugin that uses the default update mechanism
///
/// Plugins with their own update URI and single-file plugins without a
/// containing directory are left out.
pub fn derive_slugs(inventory: &[PluginDescriptor]) -> BTreeSet<String> {
    inventory
        .iter()
        .filter(|plugin| !has_custom_update_mechanism(plugin))
        .filter_map(|plugin| plugin.slug())
        .map(str::to_string)
        .collect()
}

fn normalize_requested(requested: Option<&[String]>) -> BTreeSet<String> {
    requested
        .unwrap_or_default()
        .iter()
        .map(|slug| slug.trim())
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sends the plugin inventory to the update host
pub struct InventorySync {
    remote: Arc<dyn RemoteHost>,
    limiter: Arc<dyn RateGate>,
    log: Arc<dyn ActivityLog>,
    site_home: String,
}

impl InventorySync {
    /// Create a sync bound to a remote, a limiter and an activity log
    ///
    /// `site_home` is sent as `X-Client-Home` with every request.
    pub fn new(
        remote: Arc<dyn RemoteHost>,
        limiter: Arc<dyn RateGate>,
        log: Arc<dyn ActivityLog>,
        site_home: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            limiter,
            log,
            site_home: site_home.into(),
        }
    }

    /// Synchronize `requested` slugs, or the whole inventory if none given
    pub async fn sync(
        &self,
        requested: Option<&[String]>,
        inventory: &[PluginDescriptor],
        config: &RemoteHostConfig,
        now: Instant,
    ) -> SyncResult {
        if !config.can_sync() {
            debug!("Inventory sync skipped: custom host disabled or credentials missing");
            return SyncResult::skipped(SkipReason::NotConfigured, BTreeSet::new());
        }

        let mut slugs = normalize_requested(requested);
        if slugs.is_empty() {
            slugs = derive_slugs(inventory);
        }

        if !self.limiter.admit(RateTier::Sync, now).await {
            debug!(
                "Inventory sync of {} slugs suppressed by cooldown",
                slugs.len()
            );
            return SyncResult::skipped(SkipReason::CoolingDown, slugs);
        }

        let payload: Vec<String> = slugs.iter().cloned().collect();
        let outcome = self
            .remote
            .send_plugins(&config.base_url, &config.api_key, &self.site_home, &payload)
            .await;

        match outcome {
            Ok(()) => {
                info!(
                    "Sent {} plugins to {}",
                    payload.len(),
                    config.base_url.trim_end_matches('/')
                );
                self.log
                    .record(ActivityEntry::new(
                        ACTION_SEND_PLUGINS,
                        ActivityResult::Success,
                        format!("Sent {} plugins to the update host", payload.len()),
                    ))
                    .await;

                SyncResult {
                    attempted_slugs: slugs,
                    success: true,
                    remote_error: None,
                    skipped: None,
                }
            }
            Err(e) => {
                let cause = scrub(&e.to_string(), Some(&config.api_key));
                warn!("Error sending plugins to server - {}", cause);
                self.log
                    .record(ActivityEntry::new(
                        ACTION_SEND_PLUGINS,
                        ActivityResult::Failure,
                        format!("Error sending plugins to server - {}", cause),
                    ))
                    .await;

                SyncResult {
                    attempted_slugs: slugs,
                    success: false,
                    remote_error: Some(cause),
                    skipped: None,
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::activity_log::MemoryActivityLog;
    use crate::rate_limiter::RateLimiter;
    use crate::remote::DownloadMetadata;
    use crate::secrets::SecretString;
    use async_trait::async_trait;
    use sdk::errors::UpdateError;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every inventory push; optionally fails them
    #[derive(Default)]
    pub(crate) struct RecordingRemote {
        pub calls: Mutex<Vec<Vec<String>>>,
        pub fail_with: Option<u16>,
    }

    impl RecordingRemote {
        pub fn failing(status: u16) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_with: Some(status),
            }
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteHost for RecordingRemote {
        async fn check_connected(&self, _base_url: &str) -> Result<(), UpdateError> {
            Ok(())
        }

        async fn send_plugins(
            &self,
            _base_url: &str,
            _api_key: &SecretString,
            _site_home: &str,
            slugs: &[String],
        ) -> Result<(), UpdateError> {
            self.calls.lock().unwrap().push(slugs.to_vec());
            match self.fail_with {
                Some(status) => Err(UpdateError::RemoteRejection { status }),
                None => Ok(()),
            }
        }

        async fn download_metadata(
            &self,
            _base_url: &str,
            _slug: &str,
        ) -> Result<DownloadMetadata, UpdateError> {
            Ok(DownloadMetadata::default())
        }
    }

    pub(crate) fn enabled() -> RemoteHostConfig {
        RemoteHostConfig::new(
            "https://updates.example.com",
            true,
            SecretString::new("api-key-123"),
        )
    }

    fn harness(remote: Arc<RecordingRemote>) -> (InventorySync, Arc<MemoryActivityLog>) {
        let log = Arc::new(MemoryActivityLog::new());
        let sync = InventorySync::new(
            remote,
            Arc::new(RateLimiter::default()),
            log.clone(),
            "https://site.example",
        );
        (sync, log)
    }

    fn inventory() -> Vec<PluginDescriptor> {
        vec![
            PluginDescriptor::new("akismet/akismet.php"),
            PluginDescriptor::new("vendor/vendor.php").with_update_uri("https://vendor.example"),
            PluginDescriptor::new("hello.php"),
        ]
    }

    #[test]
    fn test_derive_slugs_filters() {
        let slugs = derive_slugs(&inventory());
        assert_eq!(slugs.into_iter().collect::<Vec<_>>(), vec!["akismet"]);
    }

    #[tokio::test]
    async fn test_disabled_config_makes_no_call() {
        let remote = Arc::new(RecordingRemote::default());
        let (sync, log) = harness(remote.clone());

        let result = sync
            .sync(None, &inventory(), &RemoteHostConfig::disabled(), Instant::now())
            .await;

        assert!(!result.success);
        assert_eq!(result.skipped, Some(SkipReason::NotConfigured));
        assert!(remote.calls().is_empty());
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_call() {
        let remote = Arc::new(RecordingRemote::default());
        let (sync, _log) = harness(remote.clone());
        let config = RemoteHostConfig::new("https://updates.example.com", true, "");

        let result = sync.sync(None, &inventory(), &config, Instant::now()).await;

        assert_eq!(result.skipped, Some(SkipReason::NotConfigured));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_requested_slugs_take_precedence() {
        let remote = Arc::new(RecordingRemote::default());
        let (sync, _log) = harness(remote.clone());
        let requested = vec!["jetpack".to_string(), " ".to_string()];

        let result = sync
            .sync(Some(requested.as_slice()), &inventory(), &enabled(), Instant::now())
            .await;

        assert!(result.success);
        assert_eq!(remote.calls(), vec![vec!["jetpack".to_string()]]);
    }

    #[tokio::test]
    async fn test_remote_failure_is_swallowed_and_logged() {
        let remote = Arc::new(RecordingRemote::failing(503));
        let (sync, log) = harness(remote.clone());

        let result = sync.sync(None, &inventory(), &enabled(), Instant::now()).await;

        assert!(!result.success);
        assert!(result.skipped.is_none());
        assert!(result.remote_error.unwrap().contains("503"));
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].result, ActivityResult::Failure);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_second_sync() {
        let remote = Arc::new(RecordingRemote::default());
        let (sync, _log) = harness(remote.clone());
        let t0 = Instant::now();

        assert!(sync.sync(None, &inventory(), &enabled(), t0).await.success);
        let second = sync
            .sync(None, &inventory(), &enabled(), t0 + Duration::from_secs(60))
            .await;

        assert_eq!(second.skipped, Some(SkipReason::CoolingDown));
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_after_cooldown() {
        let remote = Arc::new(RecordingRemote::failing(500));
        let (sync, _log) = harness(remote.clone());
        let t0 = Instant::now();

        assert!(!sync.sync(None, &inventory(), &enabled(), t0).await.success);
        let later = sync
            .sync(
                None,
                &inventory(),
                &enabled(),
                t0 + crate::rate_limiter::SYNC_COOLDOWN,
            )
            .await;

        assert!(later.skipped.is_none());
        assert_eq!(remote.calls().len(), 2);
    }
}
