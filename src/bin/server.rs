use anyhow::Context;
use clap::Parser;
use faultline::{
    config::{Config, read_config_file},
    distribution::DistributionServer,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("faultline", LevelFilter::DEBUG),
        ("faultline_server", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };

    let handle = DistributionServer::bind(&config.server).await?.spawn()?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    let stats = handle.stats().await;
    info!(
        "shutting down after {} alerts ({} subscribers connected)",
        stats.alerts_ingested, stats.subscribers
    );
    handle.shutdown().await;

    match serde_json::to_string(&stats) {
        Ok(json) => info!("final stats: {json}"),
        Err(e) => warn!("failed to encode final stats: {e}"),
    }

    Ok(())
}
