//! Backoff schedule for re-establishing the push channel while the
//! polling observer covers the gap.

use std::time::Duration;

/// Exponential backoff parameters for push channel reconnects.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Ceiling for the wait between attempts.
    pub max_delay: Duration,
    /// Growth factor applied after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay to use after `current`, capped at [`max_delay`](Self::max_delay).
    pub fn next_delay(&self, current: Duration) -> Duration {
        let grown = current.as_secs_f64() * self.multiplier;
        if !grown.is_finite() || grown >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(grown)
    }
}
