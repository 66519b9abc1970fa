//! Rate Limiter Module
//!
//! Spaces outbound calls to a quota-limited API and suspends them for 24
//! hours after repeated over-quota replies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Length of the hard lockout
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

// == Rate Limiter ==
/// Per-API throttle with a secondary 24h lockout.
#[derive(Debug)]
pub struct RateLimiter {
    /// API name used in logs
    name: &'static str,
    /// Minimum spacing between two calls
    min_interval: Duration,
    /// Consecutive over-quota results that trigger the lockout
    max_failed_calls: u32,
    last_call: Option<Instant>,
    failed_calls: u32,
    blocked_until: Option<Instant>,
    blocked_since: Option<DateTime<Utc>>,
}

impl RateLimiter {
    // == Constructor ==
    pub fn new(name: &'static str, min_interval: Duration, max_failed_calls: u32) -> Self {
        Self {
            name,
            min_interval,
            max_failed_calls: max_failed_calls.max(1),
            last_call: None,
            failed_calls: 0,
            blocked_until: None,
            blocked_since: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // == Throttle ==
    /// Waits until at least `min_interval` has passed since the previous call,
    /// then records this call.
    ///
    /// Call right before the network request, after any cache lookup.
    pub async fn throttle(&mut self) {
        if let Some(last) = self.last_call {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                debug!("{} limiter waiting {}ms", self.name, wait.as_millis());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        self.last_call = Some(Instant::now());
    }

    // == Lockout ==
    /// True while the 24h lockout is in force. An expired lockout is cleared.
    pub fn check_blocked(&mut self) -> bool {
        match self.blocked_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                info!("{} API lockout expired", self.name);
                self.clear_lockout();
                false
            }
            None => false,
        }
    }

    /// Records an over-quota result.
    ///
    /// Returns true when this result started the lockout.
    pub fn record_over_quota(&mut self) -> bool {
        self.failed_calls += 1;
        warn!(
            "{} API over quota ({} of {} before lockout)",
            self.name, self.failed_calls, self.max_failed_calls
        );
        if self.failed_calls >= self.max_failed_calls && self.blocked_until.is_none() {
            self.blocked_until = Some(Instant::now() + LOCKOUT_DURATION);
            self.blocked_since = Some(Utc::now());
            warn!("{} API blocked for 24h", self.name);
            return true;
        }
        false
    }

    /// Records a successful call, ending any over-quota streak.
    pub fn record_success(&mut self) {
        self.failed_calls = 0;
    }

    /// Clears the lockout and the over-quota streak.
    pub fn reset(&mut self) {
        if self.blocked_until.is_some() || self.failed_calls > 0 {
            info!("{} API rate limit reset", self.name);
        }
        self.clear_lockout();
    }

    fn clear_lockout(&mut self) {
        self.failed_calls = 0;
        self.blocked_until = None;
        self.blocked_since = None;
    }

    // == Status ==
    pub fn status(&self) -> RateLimitStatus {
        let now = Instant::now();
        let blocked_until = self
            .blocked_until
            .filter(|until| *until > now)
            .and_then(|until| chrono::Duration::from_std(until - now).ok())
            .map(|remaining| Utc::now() + remaining);
        RateLimitStatus {
            api: self.name,
            min_interval_ms: self.min_interval.as_millis() as u64,
            consecutive_over_quota: self.failed_calls,
            blocked: blocked_until.is_some(),
            blocked_since: self.blocked_since,
            blocked_until,
        }
    }
}

// == Rate Limit Status ==
/// Operator view of a limiter.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub api: &'static str,
    pub min_interval_ms: u64,
    pub consecutive_over_quota: u32,
    pub blocked: bool,
    pub blocked_since: Option<DateTime<Utc>>,
    pub blocked_until: Option<DateTime<Utc>>,
}
