// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bounded exponential backoff for catalog requests.

use std::time::Duration;

use super::fetcher::NetworkError;

/// How often and how patiently a single request is retried.
///
/// Fetchers make exactly one attempt; the engine wraps each request with
/// this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Cap on the delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before the next attempt, after `failures` failed attempts.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(failures.saturating_sub(1));
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Whether another attempt should follow `failures` failed attempts.
    pub fn should_retry(&self, failures: u32, error: &NetworkError) -> bool {
        failures < self.max_attempts && error.is_transient()
    }
}
