//! Secure update indicator
//!
//! Surfaces whether a plugin's updates come from the custom host: the
//! "Secure update available." section on the plugin information screen and
//! the "Secure Updates Active" badge on the plugin row. Also verifies a
//! downloaded package against the checksum the host publishes for it.
//!
//! The indicator is shown only when the host publishes a well-formed
//! checksum. A malformed checksum or a package that does not match blocks
//! it and is reported as an integrity error.

use sdk::errors::UpdateError;
use sdk::types::{ActivityEntry, ActivityResult};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::activity_log::{ActivityLog, ACTION_PLUGIN_INFORMATION, ACTION_VERIFY_PACKAGE};
use crate::config::RemoteHostConfig;
use crate::remote::RemoteHost;
use crate::rewriter::slugify;
use crate::trust::{is_mirrored, is_securely_updated, TrustState};
use crate::verifier;

/// Plugin information section text
pub const SECURE_UPDATE_AVAILABLE: &str = "Secure update available.";

/// Plugin row badge text
pub const SECURE_UPDATES_ACTIVE: &str = "Secure Updates Active";

/// Secure update section for one mirrored plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecureUpdateInfo {
    pub slug: String,
    pub checksum: String,
    pub message: String,
}

/// Row badge for a plugin file, if its updates go through the custom host
pub fn row_badge(plugin_file: &str, trust_state: &TrustState) -> Option<&'static str> {
    is_securely_updated(plugin_file, trust_state).then_some(SECURE_UPDATES_ACTIVE)
}

pub struct SecureUpdateIndicator {
    remote: Arc<dyn RemoteHost>,
    log: Arc<dyn ActivityLog>,
}

impl SecureUpdateIndicator {
    pub fn new(remote: Arc<dyn RemoteHost>, log: Arc<dyn ActivityLog>) -> Self {
        Self { remote, log }
    }

    /// Published checksum of a mirrored plugin
    ///
    /// `Ok(None)` when the host is disabled, the plugin is not mirrored, the
    /// host cannot be reached or it publishes no checksum. A checksum that
    /// is not a hex SHA-256 digest is an integrity error.
    pub async fn published_checksum(
        &self,
        slug: &str,
        config: &RemoteHostConfig,
        trust_state: &TrustState,
    ) -> Result<Option<String>, UpdateError> {
        if !config.enabled || !is_mirrored(slug, trust_state) {
            debug!("No secure update lookup for {}", slug);
            return Ok(None);
        }

        let metadata = match self
            .remote
            .download_metadata(&config.base_url, &slugify(slug))
            .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Failed to fetch download metadata for {}: {}", slug, e);
                self.record(
                    ACTION_PLUGIN_INFORMATION,
                    ActivityResult::Failure,
                    format!("Failed to fetch download metadata for {}: {}", slug, e),
                )
                .await;
                return Ok(None);
            }
        };

        let checksum = match metadata.checksum.as_deref().map(str::trim) {
            Some(checksum) if !checksum.is_empty() => checksum.to_ascii_lowercase(),
            _ => {
                debug!("Host publishes no checksum for {}", slug);
                return Ok(None);
            }
        };

        if !verifier::is_well_formed_digest(&checksum) {
            let e = UpdateError::Integrity(format!("malformed checksum published for {}", slug));
            warn!("{}", e);
            self.record(ACTION_PLUGIN_INFORMATION, ActivityResult::Failure, e.to_string())
                .await;
            return Err(e);
        }

        Ok(Some(checksum))
    }

    /// Secure update section for the plugin information screen
    pub async fn plugin_information(
        &self,
        slug: &str,
        config: &RemoteHostConfig,
        trust_state: &TrustState,
    ) -> Result<Option<SecureUpdateInfo>, UpdateError> {
        let checksum = self.published_checksum(slug, config, trust_state).await?;

        Ok(checksum.map(|checksum| SecureUpdateInfo {
            slug: slug.to_string(),
            checksum,
            message: SECURE_UPDATE_AVAILABLE.to_string(),
        }))
    }

    /// Verify a downloaded package against the published checksum
    ///
    /// Fails closed: no published checksum is an integrity error as well.
    pub async fn verify_package<R: Read>(
        &self,
        slug: &str,
        config: &RemoteHostConfig,
        trust_state: &TrustState,
        package: R,
    ) -> Result<String, UpdateError> {
        let Some(checksum) = self.published_checksum(slug, config, trust_state).await? else {
            let e = UpdateError::Integrity(format!("no checksum available for {}", slug));
            self.record(ACTION_VERIFY_PACKAGE, ActivityResult::Failure, e.to_string())
                .await;
            return Err(e);
        };

        if !verifier::verify(&checksum, package) {
            let e = UpdateError::Integrity(format!("package checksum mismatch for {}", slug));
            warn!("{}", e);
            self.record(ACTION_VERIFY_PACKAGE, ActivityResult::Failure, e.to_string())
                .await;
            return Err(e);
        }

        self.record(
            ACTION_VERIFY_PACKAGE,
            ActivityResult::Success,
            format!("Package for {} matches published checksum", slug),
        )
        .await;
        Ok(checksum)
    }

    async fn record(&self, action: &str, result: ActivityResult, message: String) {
        self.log
            .record(ActivityEntry::new(action, result, message))
            .await;
    }
}
