pub mod alert;
pub mod config;
pub mod distribution;
pub mod proxy;
pub mod supervisor;
pub mod thresholds;
pub mod transport;
pub mod util;

/// Width of the `machine_id` field in a transport record (including the NUL).
pub const MACHINE_ID_LEN: usize = 32;

/// Width of the `metric` field in a transport record (including the NUL).
pub const METRIC_LEN: usize = 16;

/// One timestamped metric sample from one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub machine_id: String,
    pub metric: String,
    pub value: f64,
    /// Milliseconds since the unix epoch.
    pub observed_at: u64,
}

impl Reading {
    /// Builds a reading, cutting `machine_id` and `metric` down to what fits
    /// into the fixed-width record fields.
    pub fn new(machine_id: &str, metric: &str, value: f64, observed_at: u64) -> Self {
        Self {
            machine_id: util::truncate_to(machine_id, MACHINE_ID_LEN - 1).to_string(),
            metric: util::truncate_to(metric, METRIC_LEN - 1).to_string(),
            value,
            observed_at,
        }
    }
}
