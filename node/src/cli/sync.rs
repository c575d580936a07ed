use std::time::Duration;

use ec_sync::StreamerConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct SyncParams {
    /// First block to export. Only valid when no checkpoint exists yet: the
    /// checkpoint is initialized to the block just before it.
    #[clap(env = "ETHETL_START_BLOCK", long, short = 's', value_name = "BLOCK NUMBER")]
    pub start_block: Option<u64>,

    /// Stop once this block has been exported.
    #[clap(env = "ETHETL_END_BLOCK", long, short = 'e', value_name = "BLOCK NUMBER")]
    pub end_block: Option<u64>,

    /// Number of blocks to stay behind the chain head, to lower the chance of
    /// exporting blocks that get reorganized.
    #[arg(env = "ETHETL_LAG", long, short = 'l', default_value_t = 0)]
    pub lag: u64,

    /// Maximum number of blocks exported in a single sync cycle.
    #[arg(env = "ETHETL_BLOCK_BATCH_SIZE", long, short = 'B', default_value_t = 10)]
    pub block_batch_size: u64,

    /// Seconds to wait before polling the head again once caught up.
    #[arg(env = "ETHETL_PERIOD_SECONDS", long, value_name = "SECONDS", default_value_t = 10)]
    pub period_seconds: u64,

    /// Log and retry failed sync cycles instead of exiting.
    #[arg(env = "ETHETL_RETRY_ERRORS", long, default_value_t = true, action = clap::ArgAction::Set)]
    pub retry_errors: bool,
}

impl SyncParams {
    pub fn streamer_config(&self) -> StreamerConfig {
        StreamerConfig::default()
            .start_block(self.start_block)
            .end_block(self.end_block)
            .lag(self.lag)
            .block_batch_size(self.block_batch_size)
            .period(Duration::from_secs(self.period_seconds))
            .retry_errors(self.retry_errors)
    }
}
