//! Rate limiting module
//!
//! Cooldown gates protecting outbound calls to the update host. Two tiers
//! are kept as independent windows:
//!
//! - **Probe**: 5 second cooldown for the interactive connection test
//! - **Sync**: 1 hour suppression window for background inventory resends
//!
//! A window admits at most one call per cooldown, also under concurrent
//! callers. A rejected call leaves the window untouched, so a failed remote
//! call never blocks the next attempt once the cooldown has elapsed.
//!
//! The limiter is passed explicitly to every gated operation rather than
//! living in process globals. Gated operations see it through [`RateGate`],
//! which a store shared between processes can implement as well.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default cooldown of the probe tier
pub const PROBE_COOLDOWN: Duration = Duration::from_secs(5);

/// Default suppression window of the sync tier
pub const SYNC_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Which cooldown window a call is gated by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTier {
    /// Interactive connection test
    Probe,
    /// Background inventory sync
    Sync,
}

impl RateTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Sync => "sync",
        }
    }
}

/// One cooldown window
#[derive(Debug)]
pub struct RateWindow {
    last_request_at: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl RateWindow {
    /// Create a window that has never admitted a call
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_request_at: Mutex::new(None),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Admit a call at `now` if the cooldown has elapsed
    ///
    /// On admission `now` becomes the new reference point. A `now` earlier
    /// than the last admitted call counts as inside the window.
    pub fn allow(&self, now: Instant) -> bool {
        let mut last = self
            .last_request_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = *last {
            let elapsed = now.checked_duration_since(previous);
            if elapsed.map_or(true, |elapsed| elapsed < self.cooldown) {
                return false;
            }
        }

        *last = Some(now);
        true
    }

    /// Time left until the next call is admitted
    pub fn remaining(&self, now: Instant) -> Duration {
        let last = self
            .last_request_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match *last {
            Some(previous) => {
                let elapsed = now.saturating_duration_since(previous);
                self.cooldown.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }
}

/// Rate limiter holding one window per tier
#[derive(Debug)]
pub struct RateLimiter {
    probe: RateWindow,
    sync: RateWindow,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(PROBE_COOLDOWN, SYNC_COOLDOWN)
    }
}

impl RateLimiter {
    /// Create a rate limiter with explicit cooldowns
    pub fn new(probe_cooldown: Duration, sync_cooldown: Duration) -> Self {
        Self {
            probe: RateWindow::new(probe_cooldown),
            sync: RateWindow::new(sync_cooldown),
        }
    }

    pub fn window(&self, tier: RateTier) -> &RateWindow {
        match tier {
            RateTier::Probe => &self.probe,
            RateTier::Sync => &self.sync,
        }
    }

    /// Check and record a call in the given tier
    pub fn allow(&self, tier: RateTier, now: Instant) -> bool {
        let allowed = self.window(tier).allow(now);
        if !allowed {
            debug!(
                "Rate limit ({}) suppressed call, {:?} remaining",
                tier.as_str(),
                self.window(tier).remaining(now)
            );
        }
        allowed
    }
}

/// Admission check consulted right before a gated remote call
#[async_trait]
pub trait RateGate: Send + Sync {
    /// Admit one call in `tier` at `now`, recording it on success
    async fn admit(&self, tier: RateTier, now: Instant) -> bool;
}

#[async_trait]
impl RateGate for RateLimiter {
    async fn admit(&self, tier: RateTier, now: Instant) -> bool {
        self.allow(tier, now)
    }
}
