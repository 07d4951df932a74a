//! Supervisor: threshold evaluation of incoming readings
//!
//! ## Message Flow
//!
//! ```text
//! MetricTransport → receive → FaultDetector::process → evaluate
//!                                      │
//!                                      ├─ fault handlers (in-process, synchronous)
//!                                      └─ AlertDispatcher → distribution ingress
//! ```
//!
//! Receive errors never stop the loop. Only a transport that reports itself
//! closed ends [`Supervisor::run`].

use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::{
    Reading,
    alert::Alert,
    thresholds::ThresholdTable,
    transport::{MetricTransport, TransportError},
    util::now_ms,
};

pub mod dispatch;

pub use dispatch::{AlertDispatcher, DispatchError};

/// Pause after a failed receive before trying again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Callback invoked synchronously at the moment a fault is detected.
pub type FaultHandler = Box<dyn Fn(&Alert) + Send + Sync>;

/// Checks `reading` against `thresholds`.
///
/// Returns a critical alert iff a rule matches and the value is strictly
/// above its limit.
pub fn evaluate(reading: &Reading, thresholds: &ThresholdTable, raised_at: u64) -> Option<Alert> {
    let limit = thresholds.limit_for(&reading.machine_id, &reading.metric)?;
    (reading.value > limit).then(|| Alert::critical(reading, limit, raised_at))
}

/// Turns readings into dispatched alerts
pub struct FaultDetector {
    thresholds: ThresholdTable,
    dispatcher: AlertDispatcher,
    fault_handlers: Vec<FaultHandler>,
}

impl FaultDetector {
    pub fn new(thresholds: ThresholdTable, dispatcher: AlertDispatcher) -> Self {
        Self {
            thresholds,
            dispatcher,
            fault_handlers: Vec::new(),
        }
    }

    pub fn on_fault<F>(&mut self, handler: F)
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.fault_handlers.push(Box::new(handler));
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Evaluates one reading. On a violation the fault handlers run, then a
    /// single delivery attempt is made.
    ///
    /// Returns the raised alert, whether or not its delivery succeeded.
    pub async fn process(&self, reading: &Reading) -> Option<Alert> {
        debug!(
            "received: {} {}={:.2} at {}",
            reading.machine_id, reading.metric, reading.value, reading.observed_at
        );

        let alert = evaluate(reading, &self.thresholds, now_ms())?;

        warn!(
            "FAULT: {} {}={:.2} > {:.2}",
            alert.machine_id, alert.metric, alert.value, alert.threshold
        );

        for handler in &self.fault_handlers {
            handler(&alert);
        }

        match self.dispatcher.dispatch(&alert).await {
            Ok(()) => info!("alert sent to server for {}", alert.machine_id),
            Err(e) => warn!("dropping alert for {}: {e}", alert.machine_id),
        }

        Some(alert)
    }
}

/// Long-running consumer of a [`MetricTransport`]
pub struct Supervisor<T> {
    transport: T,
    detector: FaultDetector,
    retry_delay: Duration,
}

impl<T: MetricTransport> Supervisor<T> {
    pub fn new(transport: T, thresholds: ThresholdTable, dispatcher: AlertDispatcher) -> Self {
        Self {
            transport,
            detector: FaultDetector::new(thresholds, dispatcher),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Registers an in-process observer for detected faults.
    pub fn on_fault<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.detector.on_fault(handler);
        self
    }

    /// Runs the receive loop until the transport is closed.
    #[instrument(skip_all)]
    pub async fn run(mut self) {
        info!("running, listening for machine readings");

        loop {
            match self.transport.receive().await {
                Ok(reading) => {
                    self.detector.process(&reading).await;
                }
                Err(TransportError::Closed) => {
                    warn!("metric transport closed, stopping supervisor");
                    break;
                }
                Err(e @ TransportError::MalformedRecord(_)) => {
                    warn!("discarding reading: {e}");
                }
                Err(e) => {
                    error!("failed to receive reading: {e}");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        debug!("supervisor stopped");
    }
}
