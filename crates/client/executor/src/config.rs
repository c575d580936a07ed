use ep_resilience::RetryConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of work items per batch.
    pub batch_size: usize,
    /// Number of batches processed concurrently, and of pooled clients.
    pub max_workers: usize,
    pub retry: RetryConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { batch_size: 10, max_workers: 5, retry: RetryConfig::default() }
    }
}

impl ExecutorConfig {
    pub fn new(batch_size: usize, max_workers: usize) -> Self {
        Self { batch_size, max_workers, ..Default::default() }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.retry.max_retries, 5);
    }
}
