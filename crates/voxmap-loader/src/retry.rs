//! Bounded exponential backoff for transient load failures.

use std::time::Duration;

use rand::Rng;
use voxmap_config::LoaderConfig;

/// How a failed load is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Default: 5.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 250 ms.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry. Default: 2.0.
    pub multiplier: f64,
    /// Upper bound on any single delay. Default: 8 s.
    pub max_delay: Duration,
    /// Jitter factor (0.0–1.0), applied as ±jitter to the delay. Default: 0.25.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(250),
            multiplier: 2.0,
            max_delay: Duration::from_secs(8),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            max_delay: Duration::from_millis(config.max_backoff_ms),
            jitter: config.jitter,
        }
    }
}

/// Tracks retries of one load and computes the next delay.
pub struct Backoff {
    policy: RetryPolicy,
    retries: u32,
    current_delay: Duration,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        let initial = policy.initial_delay;
        Self {
            policy,
            retries: 0,
            current_delay: initial,
        }
    }

    /// Delay before the next attempt, or `None` once the attempt budget is
    /// spent. Call after each failed attempt.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries + 1 >= self.policy.max_attempts.max(1) {
            return None;
        }

        let base = self.current_delay;
        self.retries += 1;

        let jitter = self.policy.jitter.clamp(0.0, 1.0);
        let jittered = if jitter > 0.0 {
            let mut rng = rand::rng();
            base.mul_f64(rng.random_range((1.0 - jitter)..=(1.0 + jitter)))
        } else {
            base
        };

        let next = self.current_delay.mul_f64(self.policy.multiplier.max(1.0));
        self.current_delay = next.min(self.policy.max_delay);

        Some(jittered.min(self.policy.max_delay))
    }

    /// Retries scheduled so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}
