use anyhow::Result;
use automation_common::contracts::Client;
use automation_common::RegistryClient;
use automation_debugger::{Args, ConsoleReporter, DebugError, EligibilityPipeline, Reporter};
use automation_streams::{ReqwestTransport, StreamsClient};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Starting upkeep debugger");

    let (config, request) = match args.config().and_then(|c| Ok((c, args.request()?))) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!(registry = ?config.registry, "Using registry");

    let provider = match Client::try_from(config.node_url.as_str()) {
        Ok(provider) => provider,
        Err(e) => {
            error!("{}", DebugError::Config(format!("invalid NODE_URL: {}", e)));
            std::process::exit(1);
        }
    };
    let registry = RegistryClient::new(config.registry, Arc::new(provider));

    let streams = match config.streams {
        Some(credentials) => {
            let transport = ReqwestTransport::new(config.lookup_timeout)?;
            Some(StreamsClient::new(credentials, Arc::new(transport), config.retry))
        }
        None => {
            info!("Data streams credentials not set, StreamsLookup upkeeps cannot be evaluated");
            None
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling evaluation");
            on_signal.cancel();
        }
    });

    let pipeline = EligibilityPipeline::new(&registry, streams.as_ref());
    let report = pipeline.run(&cancel, &request).await;
    ConsoleReporter.report(&report);

    std::process::exit(report.exit_code());
}
