/// Rate windows shared between processes
///
/// Every CLI run is a separate process, so the last admitted call of each
/// tier lives in the `rate_windows` table as wall-clock milliseconds.
/// Admission is one conditional upsert: the row is written only when the
/// cooldown has elapsed, and the caller is admitted only if it wrote it.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::errors::UpdateError;
use sqlx::SqlitePool;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::rate_limiter::{RateGate, RateTier};

/// Rate window rows in the `rate_windows` table
#[derive(Clone)]
pub struct RateWindowStore {
    pool: SqlitePool,
}

impl RateWindowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Wall-clock time of the last admitted call in `tier`
    pub async fn load(&self, tier: RateTier) -> Result<Option<DateTime<Utc>>, UpdateError> {
        let millis: Option<i64> =
            sqlx::query_scalar("SELECT last_request_at FROM rate_windows WHERE tier = ?")
                .bind(tier.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| UpdateError::Database(e.to_string()))?;

        Ok(millis.and_then(DateTime::<Utc>::from_timestamp_millis))
    }

    /// Record a call at `at` if `cooldown` has elapsed since the stored one
    ///
    /// Returns whether the call was admitted. A stored time later than `at`
    /// counts as inside the window.
    pub async fn try_admit(
        &self,
        tier: RateTier,
        at: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<bool, UpdateError> {
        let cooldown_ms = i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX);

        let result = sqlx::query(
            "INSERT INTO rate_windows (tier, last_request_at) VALUES (?, ?)
             ON CONFLICT(tier) DO UPDATE SET last_request_at = excluded.last_request_at
             WHERE excluded.last_request_at - rate_windows.last_request_at >= ?",
        )
        .bind(tier.as_str())
        .bind(at.timestamp_millis())
        .bind(cooldown_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| UpdateError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}

/// [`RateGate`] over a [`RateWindowStore`]
///
/// `Instant`s are placed on the wall clock relative to an anchor taken at
/// construction. A database error suppresses the call.
pub struct SqliteRateGate {
    store: RateWindowStore,
    probe_cooldown: Duration,
    sync_cooldown: Duration,
    anchor: Instant,
    wall_anchor: DateTime<Utc>,
}

impl SqliteRateGate {
    pub fn new(store: RateWindowStore, probe_cooldown: Duration, sync_cooldown: Duration) -> Self {
        Self {
            store,
            probe_cooldown,
            sync_cooldown,
            anchor: Instant::now(),
            wall_anchor: Utc::now(),
        }
    }

    /// Pin the `Instant` / wall-clock pair both clocks are measured from
    pub fn with_anchor(mut self, anchor: Instant, wall_anchor: DateTime<Utc>) -> Self {
        self.anchor = anchor;
        self.wall_anchor = wall_anchor;
        self
    }

    fn cooldown(&self, tier: RateTier) -> Duration {
        match tier {
            RateTier::Probe => self.probe_cooldown,
            RateTier::Sync => self.sync_cooldown,
        }
    }

    fn wall_clock(&self, now: Instant) -> DateTime<Utc> {
        let to_chrono =
            |d: Duration| chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero());

        match now.checked_duration_since(self.anchor) {
            Some(ahead) => self.wall_anchor + to_chrono(ahead),
            None => self.wall_anchor - to_chrono(self.anchor.saturating_duration_since(now)),
        }
    }
}

#[async_trait]
impl RateGate for SqliteRateGate {
    async fn admit(&self, tier: RateTier, now: Instant) -> bool {
        let at = self.wall_clock(now);
        match self.store.try_admit(tier, at, self.cooldown(tier)).await {
            Ok(true) => true,
            Ok(false) => {
                debug!("Rate limit ({}) suppressed call", tier.as_str());
                false
            }
            Err(e) => {
                warn!("Rate window check failed, suppressing call: {}", e);
                false
            }
        }
    }
}
