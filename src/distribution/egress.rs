//! Egress: long-lived subscriber connections
//!
//! Every accepted connection is split. The write half goes into the
//! registry, the read half is watched so a disconnecting subscriber frees its
//! slot right away instead of at the next failed broadcast.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

use super::registry::{RegistryFull, SlotId, SubscriberRegistry};
use super::stats::Counters;

pub(crate) struct Egress {
    pub(crate) listener: TcpListener,
    pub(crate) registry: Arc<SubscriberRegistry<OwnedWriteHalf>>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl Egress {
    #[instrument(skip_all, name = "egress")]
    pub(crate) async fn run(mut self) {
        debug!("accepting subscribers");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.register(stream, peer).await,
                        Err(e) => error!("accept(client) failed: {e}"),
                    }
                }

                _ = self.shutdown.changed() => {
                    debug!("received shutdown signal");
                    break;
                }
            }
        }

        debug!("egress stopped");
    }

    async fn register(&self, stream: TcpStream, peer: SocketAddr) {
        let (read_half, write_half) = stream.into_split();

        match self.registry.insert(write_half).await {
            Ok(slot) => {
                info!("subscriber connected from {peer} (slot {})", slot.index());
                tokio::spawn(watch_subscriber(
                    read_half,
                    slot,
                    peer,
                    self.registry.clone(),
                    self.counters.clone(),
                    self.shutdown.clone(),
                ));
            }
            Err(RegistryFull(_)) => {
                // both halves are dropped here, which closes the connection
                warn!(
                    "too many subscribers ({}), rejecting {peer}",
                    self.registry.capacity()
                );
                self.counters.subscriber_rejected();
            }
        }
    }
}

/// Frees `slot` once the subscriber closes its side or the connection fails.
async fn watch_subscriber(
    mut read_half: OwnedReadHalf,
    slot: SlotId,
    peer: SocketAddr,
    registry: Arc<SubscriberRegistry<OwnedWriteHalf>>,
    counters: Arc<Counters>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = [0u8; 256];

    loop {
        tokio::select! {
            read = read_half.read(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => trace!("ignoring {n} bytes from subscriber {peer}"),
                    Err(e) => {
                        debug!("subscriber {peer} connection failed: {e}");
                        break;
                    }
                }
            }

            _ = shutdown.changed() => return,
        }
    }

    if registry.remove(slot).await {
        info!("subscriber {peer} disconnected (slot {})", slot.index());
        counters.subscribers_dropped(1);
    }
}
