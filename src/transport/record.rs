//! Fixed-layout reading record
//!
//! ```text
//! offset  size  field
//!      0    32  machine_id (UTF-8, NUL padded)
//!     32    16  metric     (UTF-8, NUL padded)
//!     48     8  value      (f64, little endian)
//!     56     8  observed_at_ms (u64, little endian)
//! ```

use crate::{MACHINE_ID_LEN, METRIC_LEN, Reading};

use super::{TransportError, TransportResult};

pub const RECORD_LEN: usize = MACHINE_ID_LEN + METRIC_LEN + 8 + 8;

const METRIC_OFFSET: usize = MACHINE_ID_LEN;
const VALUE_OFFSET: usize = METRIC_OFFSET + METRIC_LEN;
const OBSERVED_AT_OFFSET: usize = VALUE_OFFSET + 8;

impl Reading {
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];

        // the last byte of each text field stays NUL
        let machine_id = crate::util::truncate_to(&self.machine_id, MACHINE_ID_LEN - 1);
        record[..machine_id.len()].copy_from_slice(machine_id.as_bytes());

        let metric = crate::util::truncate_to(&self.metric, METRIC_LEN - 1);
        record[METRIC_OFFSET..METRIC_OFFSET + metric.len()].copy_from_slice(metric.as_bytes());

        record[VALUE_OFFSET..OBSERVED_AT_OFFSET].copy_from_slice(&self.value.to_le_bytes());
        record[OBSERVED_AT_OFFSET..].copy_from_slice(&self.observed_at.to_le_bytes());

        record
    }

    pub fn decode(record: &[u8]) -> TransportResult<Reading> {
        if record.len() != RECORD_LEN {
            return Err(TransportError::MalformedRecord(format!(
                "expected {RECORD_LEN} bytes, got {}",
                record.len()
            )));
        }

        let machine_id = text_field(&record[..METRIC_OFFSET], "machine_id")?;
        let metric = text_field(&record[METRIC_OFFSET..VALUE_OFFSET], "metric")?;

        let mut value = [0u8; 8];
        value.copy_from_slice(&record[VALUE_OFFSET..OBSERVED_AT_OFFSET]);
        let mut observed_at = [0u8; 8];
        observed_at.copy_from_slice(&record[OBSERVED_AT_OFFSET..]);

        Ok(Reading {
            machine_id,
            metric,
            value: f64::from_le_bytes(value),
            observed_at: u64::from_le_bytes(observed_at),
        })
    }
}

fn text_field(bytes: &[u8], name: &str) -> TransportResult<String> {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(str::to_string)
        .map_err(|e| TransportError::MalformedRecord(format!("{name} is not UTF-8: {e}")))
}
