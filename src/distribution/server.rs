use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ServerConfig;

use super::audit::AuditLog;
use super::egress::Egress;
use super::ingress::Ingress;
use super::registry::SubscriberRegistry;
use super::stats::{Counters, ServerStats};

/// A bound, not yet running distribution service
pub struct DistributionServer {
    ingress: TcpListener,
    egress: TcpListener,
    audit: AuditLog,
    registry: Arc<SubscriberRegistry<OwnedWriteHalf>>,
}

impl DistributionServer {
    /// Binds both listeners and opens the audit log.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let egress = TcpListener::bind((config.bind, config.egress_port))
            .await
            .with_context(|| format!("failed to bind subscriber port {}", config.egress_port))?;

        let ingress_port = config.ingress_port();
        let ingress = TcpListener::bind((config.bind, ingress_port))
            .await
            .with_context(|| format!("failed to bind alert port {ingress_port}"))?;

        let audit = AuditLog::open(&config.audit_log)
            .await
            .with_context(|| format!("failed to open audit log {}", config.audit_log.display()))?;

        Ok(Self {
            ingress,
            egress,
            audit,
            registry: Arc::new(SubscriberRegistry::new(config.max_subscribers)),
        })
    }

    /// Starts the ingress and egress tasks.
    pub fn spawn(self) -> Result<DistributionHandle> {
        let ingress_addr = self
            .ingress
            .local_addr()
            .context("failed to read alert listener address")?;
        let egress_addr = self
            .egress
            .local_addr()
            .context("failed to read subscriber listener address")?;

        let counters = Arc::new(Counters::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let egress = Egress {
            listener: self.egress,
            registry: self.registry.clone(),
            counters: counters.clone(),
            shutdown: shutdown_rx.clone(),
        };

        let ingress = Ingress {
            listener: self.ingress,
            audit: self.audit,
            registry: self.registry.clone(),
            counters: counters.clone(),
            shutdown: shutdown_rx,
        };

        info!("listening for subscribers on {egress_addr}");
        info!("listening for supervisor alerts on {ingress_addr}");

        let tasks = vec![tokio::spawn(egress.run()), tokio::spawn(ingress.run())];

        Ok(DistributionHandle {
            ingress_addr,
            egress_addr,
            registry: self.registry,
            counters,
            shutdown_tx,
            tasks,
        })
    }
}

/// Handle for a running distribution service
///
/// Dropping the handle stops both accept loops, just like [`shutdown`](Self::shutdown)
/// minus the wait.
pub struct DistributionHandle {
    ingress_addr: SocketAddr,
    egress_addr: SocketAddr,
    registry: Arc<SubscriberRegistry<OwnedWriteHalf>>,
    counters: Arc<Counters>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl DistributionHandle {
    pub fn ingress_addr(&self) -> SocketAddr {
        self.ingress_addr
    }

    pub fn egress_addr(&self) -> SocketAddr {
        self.egress_addr
    }

    pub async fn stats(&self) -> ServerStats {
        ServerStats::new(
            &self.counters,
            self.registry.len().await,
            self.registry.capacity(),
        )
    }

    /// Stops accepting, waits for both loops to finish and closes every
    /// subscriber connection.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        for task in self.tasks {
            if let Err(e) = task.await {
                error!("distribution task failed: {e}");
            }
        }

        let closed = self.registry.clear().await;
        debug!("closed {closed} subscriber connections");
    }
}
