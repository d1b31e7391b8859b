//! Process-wide rate limiting for outbound uploads.
//!
//! Combines a token bucket (one token per refill interval, up to a burst
//! capacity) with a shared cool-down deadline set after a 429. Every worker
//! passes through the same gate, so a cool-down triggered by one upload
//! pauses all of them.
//!
//! All timing uses `tokio::time::Instant`, so tests can drive the gate with
//! tokio's paused clock.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

/// Token bucket parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Time to earn one token
    pub refill_interval: Duration,
    /// Maximum stored tokens
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            refill_interval: Duration::from_secs(10),
            burst: 45,
        }
    }
}

#[derive(Debug)]
struct GateState {
    tokens: u32,
    last_refill: Instant,
    cooldown_until: Option<Instant>,
}

impl GateState {
    fn refill(&mut self, limit: &RateLimit, now: Instant) {
        if limit.refill_interval.is_zero() || self.tokens >= limit.burst {
            self.tokens = limit.burst;
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_nanos() / limit.refill_interval.as_nanos();
        if earned == 0 {
            return;
        }

        let missing = u128::from(limit.burst - self.tokens);
        if earned >= missing {
            self.tokens = limit.burst;
            self.last_refill = now;
        } else {
            // earned < missing <= u32::MAX
            let earned = earned as u32;
            self.tokens += earned;
            self.last_refill += limit.refill_interval * earned;
        }
    }
}

/// Shared token bucket plus cool-down deadline
#[derive(Debug)]
pub struct RateGate {
    limit: RateLimit,
    state: Mutex<GateState>,
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}

impl RateGate {
    /// Create a gate with a full bucket
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            state: Mutex::new(GateState {
                tokens: limit.burst,
                last_refill: Instant::now(),
                cooldown_until: None,
            }),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Wait out any active cool-down, then take one token.
    ///
    /// The cool-down is re-checked after every wait, so a deadline extended
    /// by another worker while this one sleeps is still honored.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "Waiting for upload slot");
                    sleep(wait).await;
                }
            }
        }
    }

    /// Take a token without waiting. On failure returns how long to wait
    /// before trying again.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state();
        let now = Instant::now();

        if let Some(until) = state.cooldown_until {
            if until > now {
                return Err(until - now);
            }
            state.cooldown_until = None;
        }

        state.refill(&self.limit, now);
        if self.limit.refill_interval.is_zero() || state.tokens > 0 {
            state.tokens = state.tokens.saturating_sub(1);
            return Ok(());
        }

        let next_token = state.last_refill + self.limit.refill_interval;
        Err(next_token.saturating_duration_since(now).max(Duration::from_millis(1)))
    }

    /// Push the shared cool-down deadline out to `until`. An earlier deadline
    /// never shortens one already in place.
    pub fn extend_cooldown(&self, until: Instant) {
        let mut state = self.state();
        let extended = match state.cooldown_until {
            Some(current) if current >= until => current,
            _ => until,
        };
        state.cooldown_until = Some(extended);
    }

    /// Time left on the active cool-down, if any
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let state = self.state();
        let now = Instant::now();
        state
            .cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Sleep until no cool-down is active
    pub async fn wait_cooldown(&self) {
        loop {
            let deadline = {
                let state = self.state();
                match state.cooldown_until {
                    Some(until) if until > Instant::now() => until,
                    _ => return,
                }
            };
            sleep_until(deadline).await;
        }
    }

    /// Tokens currently available (after refill)
    pub fn available_tokens(&self) -> u32 {
        let mut state = self.state();
        state.refill(&self.limit, Instant::now());
        state.tokens
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
