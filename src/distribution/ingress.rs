//! Ingress: one alert per producer connection
//!
//! Connections are served one after another on the ingress task. For each
//! one the alert line is read, appended to the audit log and then broadcast,
//! before the connection is closed.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::audit::AuditLog;
use super::registry::SubscriberRegistry;
use super::stats::Counters;

/// Upper bound for one alert line. Longer input is cut off.
pub const MAX_ALERT_BYTES: usize = 2048;

/// Reads a single alert line of at most [`MAX_ALERT_BYTES`] bytes.
///
/// Stops at the first newline or at end of stream. The bytes are returned as
/// received, without the line terminator; `None` means the producer sent
/// nothing.
pub async fn read_alert_line<R>(reader: R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader.take(MAX_ALERT_BYTES as u64));
    let mut line = Vec::with_capacity(256);
    reader.read_until(b'\n', &mut line).await?;

    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    if line.is_empty() {
        return Ok(None);
    }

    Ok(Some(line))
}

pub(crate) struct Ingress {
    pub(crate) listener: TcpListener,
    pub(crate) audit: AuditLog,
    pub(crate) registry: Arc<SubscriberRegistry<OwnedWriteHalf>>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl Ingress {
    #[instrument(skip_all, name = "ingress")]
    pub(crate) async fn run(mut self) {
        debug!("accepting alerts");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (mut stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("accept(alert) failed: {e}");
                            continue;
                        }
                    };

                    // a producer that never finishes its line must not hold up shutdown
                    tokio::select! {
                        read = read_alert_line(&mut stream) => self.handle_alert(read, peer).await,

                        _ = self.shutdown.changed() => {
                            debug!("received shutdown signal, dropping unfinished alert from {peer}");
                            break;
                        }
                    }
                }

                _ = self.shutdown.changed() => {
                    debug!("received shutdown signal");
                    break;
                }
            }
        }

        debug!("ingress stopped");
    }

    async fn handle_alert(&mut self, read: std::io::Result<Option<Vec<u8>>>, peer: SocketAddr) {
        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("{peer} closed without sending an alert");
                return;
            }
            Err(e) => {
                warn!("failed to read alert from {peer}: {e}");
                return;
            }
        };

        info!("received ALERT: {}", String::from_utf8_lossy(&line));

        if let Err(e) = self.audit.append(&line).await {
            error!(
                "failed to append to audit log {}: {e}",
                self.audit.path().display()
            );
        }

        let mut payload = line;
        payload.push(b'\n');
        let report = self.registry.broadcast(&payload).await;

        self.counters.alert_ingested();
        self.counters.subscribers_dropped(report.dropped);
        debug!(
            "broadcast to {} subscribers ({} dropped)",
            report.delivered, report.dropped
        );
    }
}
