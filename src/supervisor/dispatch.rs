//! Outbound alert delivery to the distribution service
//!
//! Every alert gets its own connection: connect, write the wire line, close.
//! There is no pooling and no retry queue. A failed attempt drops the alert,
//! the next violating reading produces a fresh one.

use std::fmt;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{instrument, trace};

use crate::alert::Alert;

/// Errors that can occur while delivering a single alert
#[derive(Debug)]
pub enum DispatchError {
    /// The alert has no wire representation
    Encode(serde_json::Error),

    /// The distribution service could not be reached
    Connect(std::io::Error),

    /// The connection broke while writing the alert
    Send(std::io::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Encode(err) => write!(f, "failed to encode alert: {}", err),
            DispatchError::Connect(err) => {
                write!(f, "cannot connect to distribution service: {}", err)
            }
            DispatchError::Send(err) => write!(f, "failed to send alert: {}", err),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Encode(err) => Some(err),
            DispatchError::Connect(err) | DispatchError::Send(err) => Some(err),
        }
    }
}

/// Sends alerts to the ingress endpoint of the distribution service
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    ingress: SocketAddr,
}

impl AlertDispatcher {
    pub fn new(ingress: SocketAddr) -> Self {
        Self { ingress }
    }

    pub fn ingress(&self) -> SocketAddr {
        self.ingress
    }

    /// Delivers `alert` over a fresh connection. Exactly one attempt is made.
    #[instrument(skip_all, fields(machine = %alert.machine_id))]
    pub async fn dispatch(&self, alert: &Alert) -> Result<(), DispatchError> {
        let line = alert.to_wire_line().map_err(DispatchError::Encode)?;

        let mut stream = TcpStream::connect(self.ingress)
            .await
            .map_err(DispatchError::Connect)?;

        stream
            .write_all(line.as_bytes())
            .await
            .map_err(DispatchError::Send)?;
        stream.shutdown().await.map_err(DispatchError::Send)?;

        trace!("wrote {} bytes to {}", line.len(), self.ingress);
        Ok(())
    }
}
