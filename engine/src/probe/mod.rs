//! Connection probe
//!
//! Unauthenticated reachability check of a candidate update host, used by
//! the interactive "test connection" action. Exactly HTTP 200 from the
//! `/connected` endpoint counts as reachable; redirects and other 2xx codes
//! do not.

use sdk::errors::UpdateError;
use sdk::types::{ActivityEntry, ActivityResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::activity_log::{ActivityLog, ACTION_TEST_CONNECTION};
use crate::rate_limiter::{RateGate, RateTier};
use crate::remote::{ensure_secure_url, RemoteHost};

/// Message shown when the probe succeeds
pub const SUCCESS_MESSAGE: &str = "Connection successful.";

/// Why a probe did not succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("Invalid URL provided.")]
    InvalidUrl,

    #[error("Refusing plaintext connection to {0}. Use an https:// URL.")]
    InsecureTransport(String),

    #[error("Connection failed with HTTP {0}. Please check the URL.")]
    Status(u16),

    #[error("Connection failed: {0}")]
    Transport(String),

    #[error("Please wait a few seconds before testing the connection again.")]
    Throttled,
}

impl From<UpdateError> for ProbeFailure {
    fn from(e: UpdateError) -> Self {
        match e {
            UpdateError::InvalidUrl(_) | UpdateError::Config(_) => Self::InvalidUrl,
            UpdateError::InsecureTransport(url) => Self::InsecureTransport(url),
            UpdateError::RemoteRejection { status } => Self::Status(status),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Reject URLs that can never be probed
///
/// Unparsable URLs, non-http(s) schemes and plaintext to a non-loopback
/// host fail here. Plaintext loopback is left to the remote's opt-in.
fn validate(candidate_url: &str) -> Result<(), ProbeFailure> {
    if candidate_url.trim().is_empty() {
        return Err(ProbeFailure::InvalidUrl);
    }
    ensure_secure_url(candidate_url, true)
        .map(|_| ())
        .map_err(ProbeFailure::from)
}

/// Check that `candidate_url` answers `GET /connected` with HTTP 200
///
/// No credentials are sent. A malformed URL fails without touching the
/// network.
pub async fn probe(remote: &dyn RemoteHost, candidate_url: &str) -> Result<(), ProbeFailure> {
    let candidate_url = candidate_url.trim();
    validate(candidate_url)?;

    remote
        .check_connected(candidate_url)
        .await
        .map_err(ProbeFailure::from)
}

/// Outcome of an interactive connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub success: bool,
    pub message: String,
}

/// Interactive connection test, throttled by the probe tier
pub struct ConnectionProbe {
    remote: Arc<dyn RemoteHost>,
    limiter: Arc<dyn RateGate>,
    log: Arc<dyn ActivityLog>,
}

impl ConnectionProbe {
    pub fn new(
        remote: Arc<dyn RemoteHost>,
        limiter: Arc<dyn RateGate>,
        log: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            remote,
            limiter,
            log,
        }
    }

    /// Probe `candidate_url` and record the outcome
    ///
    /// Malformed URLs are rejected before the cooldown is consumed.
    pub async fn test_connection(&self, candidate_url: &str, now: Instant) -> ProbeReport {
        let result = self.run(candidate_url, now).await;

        let (entry_result, report) = match &result {
            Ok(()) => {
                info!("Connection to {} successful", candidate_url.trim());
                (
                    ActivityResult::Success,
                    ProbeReport {
                        success: true,
                        message: SUCCESS_MESSAGE.to_string(),
                    },
                )
            }
            Err(ProbeFailure::Throttled) => {
                debug!("Connection test throttled");
                (
                    ActivityResult::Skipped,
                    ProbeReport {
                        success: false,
                        message: ProbeFailure::Throttled.to_string(),
                    },
                )
            }
            Err(failure) => {
                warn!("Connection test failed: {}", failure);
                (
                    ActivityResult::Failure,
                    ProbeReport {
                        success: false,
                        message: failure.to_string(),
                    },
                )
            }
        };

        self.log
            .record(ActivityEntry::new(
                ACTION_TEST_CONNECTION,
                entry_result,
                report.message.clone(),
            ))
            .await;

        report
    }

    async fn run(&self, candidate_url: &str, now: Instant) -> Result<(), ProbeFailure> {
        validate(candidate_url)?;
        if !self.limiter.admit(RateTier::Probe, now).await {
            return Err(ProbeFailure::Throttled);
        }
        probe(self.remote.as_ref(), candidate_url).await
    }
}
