pub mod checkpoint;
pub mod export;
pub mod rpc;
pub mod sync;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use checkpoint::CheckpointParams;
pub use export::ExportParams;
pub use rpc::RpcParams;
pub use sync::SyncParams;

/// Ethetl command line.
#[derive(Debug, clap::Parser)]
#[command(name = "ethetl", version, about = "Streaming ETL for Ethereum-compatible chains")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Continuously export chain entities to the configured sinks, resuming
    /// from the last synced block.
    Stream(StreamCmd),
}

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct StreamCmd {
    /// Load the configuration from a `.toml`, `.json` or `.yaml` file.
    /// Values present in the file take precedence over the command line.
    #[clap(env = "ETHETL_CONFIG_FILE", long, value_name = "PATH")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub rpc: RpcParams,

    #[clap(flatten)]
    pub sync: SyncParams,

    #[clap(flatten)]
    pub export: ExportParams,

    #[clap(flatten)]
    pub checkpoint: CheckpointParams,
}
