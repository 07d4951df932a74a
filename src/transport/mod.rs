//! Metric transport between machine simulators and the supervisor
//!
//! The supervisor only relies on [`MetricTransport::receive`], a FIFO of
//! readings that blocks until the next one is available.
//!
//! ## Implementations
//!
//! - **Channel**: in-process tokio channel, used when producer and supervisor
//!   share a process (and in tests)
//! - **Datagram**: Unix datagram socket carrying one fixed-layout 64 byte
//!   record per datagram, shared between processes

use std::fmt;

use async_trait::async_trait;

use crate::Reading;

pub mod channel;
pub mod datagram;
pub mod record;

pub use channel::{ChannelPublisher, ChannelTransport};
pub use datagram::{DatagramPublisher, DatagramTransport};
pub use record::RECORD_LEN;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while moving readings
#[derive(Debug)]
pub enum TransportError {
    /// The transport has ended and will never yield another reading
    Closed,

    /// A record did not have the fixed layout
    MalformedRecord(String),

    /// I/O error on the underlying socket
    IoError(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "metric transport closed"),
            TransportError::MalformedRecord(msg) => write!(f, "malformed reading record: {}", msg),
            TransportError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::IoError(err)
    }
}

/// Source of readings for the supervisor
///
/// `receive` suspends until a reading is available. Returning
/// [`TransportError::Closed`] ends the consumer; any other error is treated
/// as transient.
#[async_trait]
pub trait MetricTransport: Send {
    async fn receive(&mut self) -> TransportResult<Reading>;
}
