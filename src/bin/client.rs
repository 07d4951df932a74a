use std::net::IpAddr;

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::Parser;
use faultline::{
    alert::Alert,
    util::{get_host, get_port},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Prints every alert broadcast by the distribution service
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Distribution service host
    #[arg(default_value_t = get_host())]
    host: IpAddr,

    /// Subscriber port of the distribution service
    #[arg(default_value_t = get_port())]
    port: u16,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_target("faultline_client", LevelFilter::DEBUG);
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

fn summary(alert: &Alert) -> String {
    let at = DateTime::from_timestamp_millis(alert.raised_at as i64)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| alert.raised_at.to_string());

    format!(
        "[{}] {} {}={:.2} (limit {:.2}) at {at}: {}",
        alert.severity, alert.machine_id, alert.metric, alert.value, alert.threshold, alert.message
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let stream = TcpStream::connect((args.host, args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;

    println!(
        "[Client] Connected to {}:{}. Waiting for alerts...",
        args.host, args.port
    );

    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        println!("\n>>> ALERT RECEIVED: {line}");

        match Alert::from_wire_line(&line) {
            Ok(alert) => println!("    {}", summary(&alert)),
            Err(e) => trace!("not a structured alert: {e}"),
        }
    }

    warn!("disconnected from server");
    Ok(())
}
