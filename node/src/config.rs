use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure, Context};
use ec_checkpoint::CheckpointConfig;
use ec_executor::ExecutorConfig;
use ec_export::ExportOptions;
use ec_sink::SinkKind;
use ec_sync::StreamerConfig;
use ep_record::EntityType;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::StreamCmd;

/// Everything a stream run needs, resolved once at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub provider_uri: Url,
    pub rpc_timeout: Duration,
    pub entity_types: Vec<EntityType>,
    pub streamer: StreamerConfig,
    pub executor: ExecutorConfig,
    pub export: ExportOptions,
    pub checkpoint: CheckpointConfig,
    pub sinks: Vec<SinkKind>,
}

impl RunConfig {
    /// Layers the configuration file, if any, over the command line and
    /// validates the result.
    pub fn load(cmd: StreamCmd) -> anyhow::Result<Self> {
        let config_file = cmd.config_file.clone();
        let mut figment = Figment::new().merge(Serialized::defaults(cmd));

        if let Some(path) = config_file {
            figment = merge_file(figment, &path)?;
        }

        let cmd: StreamCmd = figment.extract().context("Invalid configuration")?;
        Self::from_cmd(&cmd)
    }

    pub fn from_cmd(cmd: &StreamCmd) -> anyhow::Result<Self> {
        let config = Self {
            provider_uri: cmd.rpc.provider_uri.clone(),
            rpc_timeout: cmd.rpc.rpc_timeout(),
            entity_types: cmd.export.entity_types.clone(),
            streamer: cmd.sync.streamer_config(),
            executor: cmd.rpc.executor_config(),
            export: cmd.export.export_options(),
            checkpoint: cmd.checkpoint.checkpoint_config()?,
            sinks: cmd.export.sinks.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.entity_types.is_empty(), "At least one entity type must be exported");
        ensure!(self.executor.batch_size > 0, "batch_size must be at least 1");
        ensure!(self.executor.max_workers > 0, "max_workers must be at least 1");
        ensure!(self.streamer.block_batch_size > 0, "block_batch_size must be at least 1");
        if let (Some(start), Some(end)) = (self.streamer.start_block, self.streamer.end_block) {
            ensure!(start <= end, "start_block {start} is after end_block {end}");
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> anyhow::Result<Figment> {
    Ok(match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        _ => bail!("Unsupported file type for config file: {}", path.display()),
    })
}
