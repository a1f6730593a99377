//! Named, injectable pacing for every wait the pipeline performs.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Bounded polling schedule: wait `initial_delay`, then make up to `max_attempts` checks
/// separated by `interval` (multiplied by `backoff` after each miss, capped at
/// `max_interval`).
///
/// Deserializing a partial policy fills the gaps from [`RetryPolicy::default`]; settings
/// fields that carry their own schedule use [`RetryPolicyPatch`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RetryPolicyPatch")]
pub struct RetryPolicy {
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    #[serde(with = "millis")]
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff: f64,
    #[serde(with = "millis")]
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::ZERO, Duration::from_secs(1), 10)
    }
}

impl RetryPolicy {
    pub fn fixed(initial_delay: Duration, interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            interval,
            max_attempts,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = factor;
        self.max_interval = max_interval;
        self
    }

    /// Pause after the `attempt`-th (zero-based) unsuccessful check.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.backoff <= 1.0 {
            return self.interval;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.interval.as_secs_f64() * self.backoff.powi(exponent);
        let capped = scaled.min(self.max_interval.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_interval
        }
    }

    /// Worst-case time spent before giving up.
    pub fn budget(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|a| self.delay_after(a))
            .fold(self.initial_delay, |acc, d| acc + d)
    }
}

/// A policy as written in a settings file, every field optional. Durations in milliseconds.
#[derive(Debug, Default, Deserialize)]
pub struct RetryPolicyPatch {
    pub initial_delay: Option<u64>,
    pub interval: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff: Option<f64>,
    pub max_interval: Option<u64>,
}

impl RetryPolicyPatch {
    /// Overlay the fields that were given onto `base`. An unset cap never falls below the
    /// resulting interval.
    pub fn apply_to(self, base: RetryPolicy) -> RetryPolicy {
        let interval = self.interval.map_or(base.interval, Duration::from_millis);
        RetryPolicy {
            initial_delay: self.initial_delay.map_or(base.initial_delay, Duration::from_millis),
            interval,
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            backoff: self.backoff.unwrap_or(base.backoff),
            max_interval: self
                .max_interval
                .map_or(base.max_interval.max(interval), Duration::from_millis),
        }
    }
}

impl From<RetryPolicyPatch> for RetryPolicy {
    fn from(patch: RetryPolicyPatch) -> Self {
        patch.apply_to(RetryPolicy::default())
    }
}

/// Deserialize a partial policy on top of `base()`, for use with `deserialize_with`.
pub(crate) fn overlay<'de, D>(d: D, base: fn() -> RetryPolicy) -> Result<RetryPolicy, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RetryPolicyPatch::deserialize(d)?.apply_to(base()))
}

/// Run `check` on `policy`'s schedule until it yields a value or the attempts run out.
///
/// `check` receives the zero-based attempt number. No pause follows the final attempt.
pub async fn poll_until<T, F, Fut>(policy: &RetryPolicy, mut check: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    if !policy.initial_delay.is_zero() {
        tokio::time::sleep(policy.initial_delay).await;
    }
    for attempt in 0..policy.max_attempts {
        if let Some(found) = check(attempt).await {
            return Some(found);
        }
        if attempt + 1 < policy.max_attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }
    None
}

/// Serialize durations as integer milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
