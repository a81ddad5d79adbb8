//! Exponential backoff between session lifecycle attempts

use std::time::Duration;

use rand::Rng;
use tp_core::config::BackoffConfig;

/// Exponential backoff with jitter
pub struct ExponentialBackoff {
    /// Delay the next call starts from
    current: Duration,
    /// Upper bound before jitter
    max: Duration,
    /// Growth factor per attempt
    multiplier: f64,
    /// Jitter factor, clamped to 0.0..=1.0
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a new backoff with custom parameters
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            current: initial,
            max,
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Get the next delay and advance the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        let next = self.current.as_secs_f64() * self.multiplier;
        self.current = Duration::try_from_secs_f64(next)
            .map(|next| next.min(self.max))
            .unwrap_or(self.max);

        if self.jitter == 0.0 {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter;
        let extra = Duration::try_from_secs_f64(rand::thread_rng().gen_range(0.0..=spread))
            .unwrap_or(Duration::ZERO);
        delay.saturating_add(extra)
    }
}
