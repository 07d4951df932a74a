//! Alert record and its wire representation
//!
//! An alert travels as a single newline-terminated JSON object:
//!
//! ```text
//! {"machine":"Machine-7","metric":"temp","value":95.00,"threshold":80.00,"severity":"CRIT","ts":1700000000000,"msg":"temp exceeded threshold"}
//! ```
//!
//! `value` and `threshold` are always rendered with two decimals. The
//! distribution service never parses this line; it only logs and relays it.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer, ser::Error as _};
use serde_json::value::RawValue;

use crate::{Reading, util::truncate_to};

/// Maximum size of the alert message (including the terminating NUL of the
/// fixed-width record it mirrors).
pub const ALERT_MSG_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warn,
    Crit,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => write!(f, "WARN"),
            Severity::Crit => write!(f, "CRIT"),
        }
    }
}

/// A fault notification raised when a reading violates its threshold rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "machine")]
    pub machine_id: String,

    pub metric: String,

    #[serde(serialize_with = "two_decimals")]
    pub value: f64,

    #[serde(serialize_with = "two_decimals")]
    pub threshold: f64,

    pub severity: Severity,

    /// Milliseconds since the unix epoch.
    #[serde(rename = "ts")]
    pub raised_at: u64,

    #[serde(rename = "msg")]
    pub message: String,
}

impl Alert {
    /// Builds the critical alert for `reading` exceeding `threshold`.
    pub fn critical(reading: &Reading, threshold: f64, raised_at: u64) -> Self {
        let message = format!("{} exceeded threshold", reading.metric);

        Self {
            machine_id: reading.machine_id.clone(),
            metric: reading.metric.clone(),
            value: reading.value,
            threshold,
            severity: Severity::Crit,
            raised_at,
            message: truncate_to(&message, ALERT_MSG_LEN - 1).to_string(),
        }
    }

    /// Renders the alert as one wire line, including the trailing newline.
    ///
    /// Fails for non-finite `value` or `threshold`, which have no JSON
    /// representation.
    pub fn to_wire_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parses a wire line back into an alert. Trailing line terminators are
    /// ignored.
    pub fn from_wire_line(line: &str) -> serde_json::Result<Alert> {
        serde_json::from_str(line.trim_end_matches(['\r', '\n']))
    }
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !value.is_finite() {
        return Err(S::Error::custom(format!("cannot encode {value} as a number")));
    }

    let raw = RawValue::from_string(format!("{value:.2}")).map_err(S::Error::custom)?;
    raw.serialize(serializer)
}
