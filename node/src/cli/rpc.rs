use std::time::Duration;

use ec_executor::ExecutorConfig;
use ep_resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct RpcParams {
    /// JSON-RPC endpoint of the Ethereum node. Trace entities need a node
    /// exposing `trace_block` or `debug_traceBlockByNumber`.
    #[clap(env = "ETHETL_PROVIDER_URI", long, short = 'p', value_name = "URL", default_value = "http://localhost:8545")]
    pub provider_uri: Url,

    /// Timeout of a single JSON-RPC batch request, in seconds.
    #[arg(env = "ETHETL_RPC_TIMEOUT_SECS", long, value_name = "SECONDS", default_value_t = 30)]
    pub rpc_timeout_secs: u64,

    /// Number of requests sent in a single JSON-RPC batch.
    #[arg(env = "ETHETL_BATCH_SIZE", long, default_value_t = 10)]
    pub batch_size: usize,

    /// Number of batches in flight at once. Each worker owns its own client.
    #[arg(env = "ETHETL_MAX_WORKERS", long, short = 'w', default_value_t = 5)]
    pub max_workers: usize,

    /// Retries of a transiently failing batch before the cycle fails.
    #[arg(env = "ETHETL_MAX_RETRIES", long, default_value_t = 5)]
    pub max_retries: usize,
}

impl RpcParams {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new(self.batch_size, self.max_workers)
            .with_retry(RetryConfig::default().with_max_retries(self.max_retries))
    }
}
