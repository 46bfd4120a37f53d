use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    ExponentialBackoff,
    LinearBackoff,
    FixedDelay,
}

/// Delay between upload runs after a run stops on a recoverable failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub strategy: BackoffStrategy,
    #[serde(with = "crate::config::serde_helpers")]
    pub base_delay: Duration,
    #[serde(with = "crate::config::serde_helpers")]
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::ExponentialBackoff,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            jitter: true,
        }
    }
}

/// Tracks consecutive failed runs and turns them into delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    /// Registers one more failed run and returns how long to wait.
    pub fn record_failure(&mut self) -> Duration {
        let delay = self.calculate_delay(self.consecutive_failures);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_millis = self.config.base_delay.as_millis() as u64;
        let base_delay = match self.config.strategy {
            BackoffStrategy::ExponentialBackoff => {
                let multiplier = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
                Duration::from_millis(base_millis.saturating_mul(multiplier))
            }
            BackoffStrategy::LinearBackoff => {
                Duration::from_millis(base_millis.saturating_mul(attempt as u64 + 1))
            }
            BackoffStrategy::FixedDelay => self.config.base_delay,
        };

        let capped_delay = std::cmp::min(base_delay, self.config.max_delay);

        // Jitter never pushes the delay past the ceiling
        if self.config.jitter {
            std::cmp::min(Self::apply_jitter(capped_delay), self.config.max_delay)
        } else {
            capped_delay
        }
    }

    fn apply_jitter(delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let jitter_factor = rng.random_range(0.5..1.5); // ±50% jitter
        let jittered_millis = (delay.as_millis() as f64 * jitter_factor) as u64;
        Duration::from_millis(jittered_millis)
    }
}
