//! Ethetl command line.

mod cli;
mod config;
mod logging;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, StreamCmd};
use config::RunConfig;
use ec_executor::BatchWorkExecutor;
use ec_export::{EthStreamerAdapter, ExportPlanner};
use ec_rpc::{HttpTransport, RpcClient};
use ec_sync::Streamer;
use ep_utils::{service_state_channel, AbortOnDrop, ServiceContext};

const GREET_IMPL_NAME: &str = "Ethetl";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging()?;

    match Cli::parse().command {
        Command::Stream(cmd) => stream(cmd).await,
    }
}

async fn stream(cmd: StreamCmd) -> anyhow::Result<()> {
    let config = RunConfig::load(cmd)?;

    tracing::info!("🧬 {} streaming ETL", GREET_IMPL_NAME);
    tracing::info!("✌️  Version {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("🌐 Provider: {}", config.provider_uri);
    tracing::info!(
        "📦 Entities: {}",
        config.entity_types.iter().map(|kind| kind.as_str()).collect::<Vec<_>>().join(", ")
    );

    let ctx = ServiceContext::new();
    let _signals = AbortOnDrop::spawn(cancel_on_signal(ctx.clone()));

    let checkpoint = ec_checkpoint::open(&config.checkpoint).await.context("Opening checkpoint store")?;

    let head_client = RpcClient::new(HttpTransport::new(config.provider_uri.clone(), config.rpc_timeout)?);
    let executor = BatchWorkExecutor::try_new(config.executor.clone(), &ctx, |_| {
        HttpTransport::new(config.provider_uri.clone(), config.rpc_timeout).map(RpcClient::new)
    })?;
    let planner = ExportPlanner::new(executor, config.export.clone());
    let sink = ec_sink::build_sinks(&config.sinks);
    let adapter = EthStreamerAdapter::new(head_client, planner, sink, config.entity_types.clone());

    let (state_sender, mut state_receiver) = service_state_channel();
    let _state_logger = AbortOnDrop::spawn(async move {
        while let Some(event) = state_receiver.recv().await {
            tracing::debug!(?event, "Streamer state");
        }
    });

    let mut streamer = Streamer::new(adapter, checkpoint, config.streamer.clone()).with_service_state_sender(state_sender);
    streamer.run(ctx).await
}

/// Cancels the global context on the first SIGINT or SIGTERM.
async fn cancel_on_signal(ctx: ServiceContext) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    ctx.cancel_global();
}
