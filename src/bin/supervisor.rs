use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use clap::Parser;
use faultline::{
    config::{Config, read_config_file},
    supervisor::{AlertDispatcher, Supervisor},
    thresholds::ThresholdTable,
    transport::DatagramTransport,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Threshold rule file (overrides the config file)
    #[arg(short, long)]
    thresholds: Option<PathBuf>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("faultline", LevelFilter::DEBUG),
        ("faultline_supervisor", LevelFilter::TRACE),
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
    .supervisor;

    let thresholds_path = args.thresholds.unwrap_or(config.thresholds.clone());
    let (thresholds, report) = ThresholdTable::load(&thresholds_path);
    info!(
        "loaded {} thresholds from {} ({} skipped, {} dropped)",
        thresholds.len(),
        thresholds_path.display(),
        report.skipped,
        report.dropped
    );

    let transport = DatagramTransport::bind(&config.socket).with_context(|| {
        format!(
            "failed to bind metric transport at {}",
            config.socket.display()
        )
    })?;

    let faults = Arc::new(AtomicU64::new(0));
    let faults_clone = faults.clone();

    let supervisor = Supervisor::new(
        transport,
        thresholds,
        AlertDispatcher::new(config.ingress_addr()),
    )
    .retry_delay(config.retry_delay())
    .on_fault(move |alert| {
        faults_clone.fetch_add(1, Ordering::Relaxed);
        warn!(
            "local alert handler triggered: {} {}",
            alert.machine_id, alert.metric
        );
    });

    tokio::select! {
        _ = supervisor.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
        }
    }

    info!(
        "supervisor stopped after {} faults",
        faults.load(Ordering::Relaxed)
    );

    Ok(())
}
