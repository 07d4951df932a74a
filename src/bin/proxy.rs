use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use faultline::{
    config::{Config, read_config_file},
    proxy,
};
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Relays broadcast alerts to WebSocket clients
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Address web clients connect to (overrides the config file)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("faultline", LevelFilter::DEBUG),
        ("faultline_proxy", LevelFilter::TRACE),
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
    }
    .proxy;

    let listen = args.listen.unwrap_or(config.listen);
    let upstream = config.upstream();

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind WebSocket port {listen}"))?;

    info!(
        "WebSocket listening on ws://{}, relaying alerts from {upstream}",
        listener.local_addr()?
    );

    proxy::serve(listener, upstream, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {e}");
        }
    })
    .await
    .context("WebSocket server failed")?;

    info!("proxy stopped");
    Ok(())
}
