use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, ensure};
use clap::Parser;
use faultline::{
    Reading,
    transport::DatagramPublisher,
    util::{get_socket_path, now_ms},
};
use rand::Rng;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Simulated machine publishing random readings for one metric
#[derive(Debug, Clone, Parser)]
#[command(after_help = "Example: faultline-machine Machine-1 temp 20 90 2000")]
struct Args {
    machine_id: String,

    metric: String,

    /// Lower bound of the generated values
    min: f64,

    /// Upper bound of the generated values
    max: f64,

    /// Milliseconds between two readings
    interval_ms: u64,

    /// Socket path of the supervisor's metric transport
    #[arg(long, default_value_os_t = get_socket_path())]
    socket: PathBuf,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("faultline", LevelFilter::DEBUG),
        ("faultline_machine", LevelFilter::TRACE),
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

    ensure!(
        args.min.is_finite() && args.max.is_finite() && args.min <= args.max,
        "invalid value range {}..{}",
        args.min,
        args.max
    );
    ensure!(args.interval_ms > 0, "interval must be positive");

    let publisher = DatagramPublisher::new(&args.socket).context("failed to create socket")?;

    info!(
        "[{}] started (metric={} interval={} ms)",
        args.machine_id, args.metric, args.interval_ms
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let value = rand::thread_rng().gen_range(args.min..=args.max);
                let reading = Reading::new(&args.machine_id, &args.metric, value, now_ms());

                match publisher.publish(&reading).await {
                    Ok(()) => info!("[{}] {}={:.2}", reading.machine_id, reading.metric, value),
                    Err(e) => error!("[{}] failed to publish reading: {e}", reading.machine_id),
                }
            }

            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for shutdown signal")?;
                break;
            }
        }
    }

    Ok(())
}
