//! In-process rate governance for the external source APIs.
//!
//! Each source gets an independently configured `(request_limit, window)`
//! pair with a resetting window counter: the first check past the window
//! boundary zeroes the counter before the new request is evaluated. State is
//! in-memory only: best-effort governance against the remote APIs' published
//! limits, not a distributed limiter. Assumes at most one orchestrator
//! process per deployment.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use themeradar_core::{SourceId, SourcesFile};

use crate::error::CollectError;

/// Exponential backoff parameters shared by all sources.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub jitter_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            cap_ms: 60_000,
            jitter_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SourceLimit {
    request_limit: u32,
    window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    window_started_at: Instant,
    count: u32,
}

/// Per-source token/window accounting plus backoff timing.
///
/// Constructed once per process and passed by reference into collectors and
/// the orchestrator, so tests can supply isolated instances. The counter
/// mutex is only held for arithmetic; it is never held across an await.
#[derive(Debug)]
pub struct RateGovernor {
    limits: HashMap<SourceId, SourceLimit>,
    backoff: BackoffPolicy,
    state: Mutex<HashMap<SourceId, WindowState>>,
}

impl RateGovernor {
    #[must_use]
    pub fn new(sources: &SourcesFile, backoff: BackoffPolicy) -> Self {
        let limits = SourceId::ALL
            .into_iter()
            .map(|source| {
                let settings = sources.settings_for(source);
                (
                    source,
                    SourceLimit {
                        request_limit: settings.request_limit,
                        window: settings.window(),
                    },
                )
            })
            .collect();

        Self {
            limits,
            backoff,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn limit_for(&self, source: SourceId) -> SourceLimit {
        // Every SourceId is inserted in `new`; the fallback is unreachable in
        // practice but keeps the accessor total.
        self.limits.get(&source).copied().unwrap_or(SourceLimit {
            request_limit: 1,
            window: Duration::from_secs(60),
        })
    }

    /// Attempts to take one request slot. Returns `false` when the current
    /// window is exhausted.
    pub fn try_acquire(&self, source: SourceId) -> bool {
        let limit = self.limit_for(source);
        let mut state = self.state.lock().expect("rate governor mutex poisoned");
        let entry = Self::entry_with_reset(&mut state, source, limit);

        if entry.count < limit.request_limit {
            entry.count += 1;
            true
        } else {
            false
        }
    }

    /// Records one request against the window unconditionally.
    pub fn record_request(&self, source: SourceId) {
        let limit = self.limit_for(source);
        let mut state = self.state.lock().expect("rate governor mutex poisoned");
        let entry = Self::entry_with_reset(&mut state, source, limit);
        entry.count = entry.count.saturating_add(1);
    }

    /// Request slots left in the current window.
    pub fn remaining(&self, source: SourceId) -> u32 {
        let limit = self.limit_for(source);
        let mut state = self.state.lock().expect("rate governor mutex poisoned");
        let entry = Self::entry_with_reset(&mut state, source, limit);
        limit.request_limit.saturating_sub(entry.count)
    }

    /// Suspends until a request slot is available, then takes it.
    pub async fn wait_until_available(&self, source: SourceId) {
        loop {
            if self.try_acquire(source) {
                return;
            }

            let sleep_for = {
                let limit = self.limit_for(source);
                let state = self.state.lock().expect("rate governor mutex poisoned");
                state.get(&source).map_or(limit.window, |entry| {
                    limit
                        .window
                        .saturating_sub(entry.window_started_at.elapsed())
                        // Window boundary just passed; re-check promptly.
                        .max(Duration::from_millis(10))
                })
            };

            tracing::debug!(
                source = %source,
                sleep_ms = u64::try_from(sleep_for.as_millis()).unwrap_or(u64::MAX),
                "rate window exhausted, waiting for reset"
            );
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Suspends for `min(base·2^attempt, cap)` plus random jitter.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::RetryExhausted`] once `attempt >= max_attempts`,
    /// without sleeping.
    pub async fn backoff(
        &self,
        source: SourceId,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<(), CollectError> {
        if attempt >= max_attempts {
            return Err(CollectError::RetryExhausted {
                source,
                attempts: attempt,
            });
        }

        let delay = self.backoff_delay(attempt);
        tracing::warn!(
            source = %source,
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "backing off before retry"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Backoff delay for one attempt: capped exponential plus additive jitter.
    /// Always within `[base·2^attempt, base·2^attempt + jitter_ms]` (before
    /// the cap applies).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .backoff
            .base_ms
            .saturating_mul(1u64 << attempt.min(20))
            .min(self.backoff.cap_ms);
        let jitter = if self.backoff.jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..=self.backoff.jitter_ms)
        };
        Duration::from_millis(exponential.saturating_add(jitter))
    }

    fn entry_with_reset<'a>(
        state: &'a mut HashMap<SourceId, WindowState>,
        source: SourceId,
        limit: SourceLimit,
    ) -> &'a mut WindowState {
        let entry = state.entry(source).or_insert(WindowState {
            window_started_at: Instant::now(),
            count: 0,
        });

        // Resetting counter: first check past the window boundary zeroes the
        // count before the new request is evaluated.
        if entry.window_started_at.elapsed() >= limit.window {
            entry.window_started_at = Instant::now();
            entry.count = 0;
        }

        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use themeradar_core::SourceSettings;

    fn governor_with(limit: u32, window_secs: u64, backoff: BackoffPolicy) -> RateGovernor {
        let mut sources = StdHashMap::new();
        for source in SourceId::ALL {
            sources.insert(
                source,
                SourceSettings {
                    request_limit: limit,
                    window_secs,
                    base_url: None,
                },
            );
        }
        RateGovernor::new(&SourcesFile { sources }, backoff)
    }

    #[test]
    fn remaining_decreases_by_one_per_recorded_request() {
        let governor = governor_with(5, 3600, BackoffPolicy::default());

        assert_eq!(governor.remaining(SourceId::Forum), 5);
        governor.record_request(SourceId::Forum);
        assert_eq!(governor.remaining(SourceId::Forum), 4);
        governor.record_request(SourceId::Forum);
        assert_eq!(governor.remaining(SourceId::Forum), 3);
    }

    #[test]
    fn sources_have_independent_windows() {
        let governor = governor_with(2, 3600, BackoffPolicy::default());

        governor.record_request(SourceId::Forum);
        governor.record_request(SourceId::Forum);
        assert_eq!(governor.remaining(SourceId::Forum), 0);
        assert_eq!(governor.remaining(SourceId::Social), 2);
    }

    #[test]
    fn try_acquire_fails_when_window_exhausted() {
        let governor = governor_with(2, 3600, BackoffPolicy::default());

        assert!(governor.try_acquire(SourceId::Codehost));
        assert!(governor.try_acquire(SourceId::Codehost));
        assert!(!governor.try_acquire(SourceId::Codehost));
    }

    #[test]
    fn window_resets_after_duration_elapses() {
        // Zero-length window: every check is past the boundary, so the
        // counter resets to the configured maximum before each evaluation.
        let governor = governor_with(3, 0, BackoffPolicy::default());

        governor.record_request(SourceId::Trends);
        governor.record_request(SourceId::Trends);
        assert_eq!(governor.remaining(SourceId::Trends), 3);
        assert!(governor.try_acquire(SourceId::Trends));
    }

    #[test]
    fn backoff_delay_is_within_exponential_plus_jitter_bounds() {
        let policy = BackoffPolicy {
            base_ms: 100,
            cap_ms: 60_000,
            jitter_ms: 50,
        };
        let governor = governor_with(1, 3600, policy);

        for attempt in 0..5u32 {
            let expected_base = 100u64 << attempt;
            let delay = governor.backoff_delay(attempt).as_millis();
            let delay = u64::try_from(delay).expect("fits");
            assert!(
                (expected_base..=expected_base + 50).contains(&delay),
                "attempt {attempt}: delay {delay}ms outside [{expected_base}, {}]",
                expected_base + 50
            );
        }
    }

    #[test]
    fn backoff_delay_caps_at_configured_maximum() {
        let policy = BackoffPolicy {
            base_ms: 1_000,
            cap_ms: 4_000,
            jitter_ms: 0,
        };
        let governor = governor_with(1, 3600, policy);

        assert_eq!(governor.backoff_delay(10), Duration::from_millis(4_000));
    }

    #[tokio::test]
    async fn backoff_errors_once_attempts_reach_maximum() {
        let policy = BackoffPolicy {
            base_ms: 0,
            cap_ms: 0,
            jitter_ms: 0,
        };
        let governor = governor_with(1, 3600, policy);

        governor
            .backoff(SourceId::Social, 2, 3)
            .await
            .expect("attempt below maximum should sleep and succeed");

        let result = governor.backoff(SourceId::Social, 3, 3).await;
        assert!(
            matches!(
                result,
                Err(CollectError::RetryExhausted {
                    source: SourceId::Social,
                    attempts: 3
                })
            ),
            "expected RetryExhausted, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn wait_until_available_returns_immediately_with_free_slots() {
        let governor = governor_with(2, 3600, BackoffPolicy::default());

        governor.wait_until_available(SourceId::Launchboard).await;
        assert_eq!(governor.remaining(SourceId::Launchboard), 1);
    }

    #[tokio::test]
    async fn wait_until_available_recovers_after_window_reset() {
        // Zero-length window: exhaustion is momentary and the wait loop
        // acquires on its next pass without sleeping a full window.
        let governor = governor_with(1, 0, BackoffPolicy::default());

        assert!(governor.try_acquire(SourceId::Forum));
        governor.wait_until_available(SourceId::Forum).await;
    }
}
