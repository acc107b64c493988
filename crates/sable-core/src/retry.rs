//! Transient-failure classification and linear backoff.
//!
//! The execution engine retries a statement when the native error looks like a
//! dropped server connection. This module holds the sync building blocks:
//!
//! - [`RetryPolicy`]: attempt budget and base delay
//! - [`is_transient`]: classify a native error code / message
//! - [`RetryPolicy::backoff`]: delay before the next attempt

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default total attempts (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Message fragments reported by servers that dropped or refused the session.
pub const TRANSIENT_MESSAGES: &[&str] = &[
    "server has gone away",
    "Lost connection",
    "Error connecting",
];

/// Native MySQL client codes for "gone away" and "lost connection".
pub const TRANSIENT_CODES: &[i64] = &[2006, 2013];

/// Retry budget for statement execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay unit in ms; attempt `n` waits `n * base_delay_ms` (default: 100).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
        }
    }

    /// Delay to sleep after failed attempt `attempt` (1-based).
    ///
    /// Linear: 100ms after the first failure, 200ms after the second.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a native error should trigger reconnect-and-retry.
///
/// Matches on the known client codes, then on message fragments, so drivers
/// that lose the numeric code still classify correctly.
pub fn is_transient(code: Option<i64>, message: &str) -> bool {
    if code.is_some_and(|c| TRANSIENT_CODES.contains(&c)) {
        return true;
    }
    TRANSIENT_MESSAGES.iter().any(|m| message.contains(m))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
