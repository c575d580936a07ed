/// Phase based retry strategy for batch RPC work.
///
/// - **Aggressive**: the first few attempts retry on a short fixed interval to
///   absorb momentary blips.
/// - **Backoff**: following attempts back off exponentially.
/// - **Steady**: once the exponential delay hits its cap the interval stays
///   fixed.
///
/// Unlike a connection retry, a batch retry is always bounded: after
/// `max_retries` attempts [RetryState::is_exhausted] reports true and the
/// caller must give up.
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Tests use tokio's clock so paused time can drive throttling.
#[cfg(not(test))]
type InstantProvider = std::time::Instant;

#[cfg(test)]
type InstantProvider = tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of retries performed on the aggressive interval.
    pub aggressive_retries: usize,
    /// Retry interval during the aggressive phase.
    pub aggressive_interval: Duration,
    /// First delay of the exponential phase.
    pub backoff_min_delay: Duration,
    /// Cap for exponential growth, also the steady phase interval.
    pub max_backoff: Duration,
    /// Minimum interval between two retry warnings.
    pub log_interval: Duration,
    /// Maximum number of retries before giving up.
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            aggressive_retries: 2,
            aggressive_interval: Duration::from_millis(500),
            backoff_min_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            log_interval: Duration::from_secs(10),
            max_retries: 5,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// A config which retries immediately, for tests.
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            aggressive_retries: max_retries,
            aggressive_interval: Duration::ZERO,
            backoff_min_delay: Duration::ZERO,
            max_backoff: Duration::ZERO,
            log_interval: Duration::ZERO,
            max_retries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Aggressive,
    Backoff,
    Steady,
}

pub struct RetryState {
    config: RetryConfig,
    start_time: InstantProvider,
    last_log_time: Option<InstantProvider>,
    retry_count: usize,
}

impl std::fmt::Debug for RetryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryState")
            .field("config", &self.config)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

impl RetryState {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, start_time: InstantProvider::now(), last_log_time: None, retry_count: 0 }
    }

    pub fn current_phase(&self) -> RetryPhase {
        if self.retry_count <= self.config.aggressive_retries {
            RetryPhase::Aggressive
        } else if self.backoff_delay() < self.config.max_backoff {
            RetryPhase::Backoff
        } else {
            RetryPhase::Steady
        }
    }

    fn backoff_delay(&self) -> Duration {
        // Cap the exponent at 16 to keep the multiplication in range.
        let exponent = self.retry_count.saturating_sub(self.config.aggressive_retries + 1).min(16) as u32;
        self.config.backoff_min_delay.saturating_mul(2_u32.saturating_pow(exponent))
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&self) -> Duration {
        match self.current_phase() {
            RetryPhase::Aggressive => self.config.aggressive_interval,
            RetryPhase::Backoff => self.backoff_delay().min(self.config.max_backoff),
            RetryPhase::Steady => self.config.max_backoff,
        }
    }

    /// Throttles retry warnings to one per `log_interval`.
    pub fn should_log(&mut self) -> bool {
        match self.last_log_time {
            Some(last) if last.elapsed() < self.config.log_interval => false,
            _ => {
                self.last_log_time = Some(InstantProvider::now());
                true
            }
        }
    }

    /// Increment retry counter and return current count
    pub fn increment_retry(&mut self) -> usize {
        self.retry_count += 1;
        self.retry_count
    }

    pub fn get_retry_count(&self) -> usize {
        self.retry_count
    }

    pub fn max_retries(&self) -> usize {
        self.config.max_retries
    }

    /// True once `max_retries` retries have been spent.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.config.max_retries
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
