//! Process-shared metric transport over a Unix datagram socket
//!
//! The supervisor binds the socket path, machine simulators send one
//! [`RECORD_LEN`](super::RECORD_LEN) byte record per datagram to it. Local
//! datagram sockets are reliable and preserve order per sender.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::UnixDatagram;
use tracing::{debug, trace};

use crate::Reading;

use super::{MetricTransport, RECORD_LEN, TransportResult};

/// Consumer side, bound at a filesystem path
#[derive(Debug)]
pub struct DatagramTransport {
    socket: UnixDatagram,
    path: PathBuf,
}

impl DatagramTransport {
    /// Binds the socket at `path`, replacing a stale socket file left behind
    /// by a previous run.
    pub fn bind(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            debug!("removing stale socket {}", path.display());
            std::fs::remove_file(&path)?;
        }

        let socket = UnixDatagram::bind(&path)?;
        debug!("metric transport bound at {}", path.display());

        Ok(Self { socket, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatagramTransport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[async_trait]
impl MetricTransport for DatagramTransport {
    async fn receive(&mut self) -> TransportResult<Reading> {
        // one spare byte so oversized datagrams show up as a length mismatch
        let mut buf = [0u8; RECORD_LEN + 1];
        let n = self.socket.recv(&mut buf).await?;
        trace!("received {n} byte datagram");
        Reading::decode(&buf[..n])
    }
}

/// Producer side, sending to the supervisor's socket path
///
/// The publisher does not connect up front, so it keeps working when the
/// supervisor is restarted and rebinds the path.
#[derive(Debug)]
pub struct DatagramPublisher {
    socket: UnixDatagram,
    target: PathBuf,
}

impl DatagramPublisher {
    pub fn new(target: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            socket: UnixDatagram::unbound()?,
            target: target.as_ref().to_path_buf(),
        })
    }

    pub async fn publish(&self, reading: &Reading) -> TransportResult<()> {
        self.socket.send_to(&reading.encode(), &self.target).await?;
        Ok(())
    }
}
