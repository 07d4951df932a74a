use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use chrono::Utc;

pub const DEFAULT_EGRESS_PORT: u16 = 9000;

/// Producers talk to the port right above the subscriber port.
pub const DEFAULT_INGRESS_PORT: u16 = DEFAULT_EGRESS_PORT + 1;

const FAULTLINE_HOST: &str = "FAULTLINE_HOST";

const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub fn get_host() -> IpAddr {
    let host_from_env = std::env::var(FAULTLINE_HOST);
    host_from_env.map_or(DEFAULT_HOST, |res| res.parse().unwrap_or(DEFAULT_HOST))
}

const FAULTLINE_PORT: &str = "FAULTLINE_PORT";

/// Subscriber port, overridable through `FAULTLINE_PORT`.
pub fn get_port() -> u16 {
    port_or_default(std::env::var(FAULTLINE_PORT).ok())
}

fn port_or_default(value: Option<String>) -> u16 {
    value.map_or(DEFAULT_EGRESS_PORT, |res| {
        res.parse().unwrap_or(DEFAULT_EGRESS_PORT)
    })
}

/// Alert port paired with `egress_port`. An ephemeral subscriber port (0)
/// pairs with an ephemeral alert port.
pub fn ingress_port_for(egress_port: u16) -> u16 {
    match egress_port {
        0 => 0,
        port => port.checked_add(1).unwrap_or(0),
    }
}

const FAULTLINE_SOCKET: &str = "FAULTLINE_SOCKET";

const DEFAULT_SOCKET_PATH: &str = "/tmp/faultline.sock";

pub fn get_socket_path() -> PathBuf {
    std::env::var(FAULTLINE_SOCKET).map_or_else(|_| PathBuf::from(DEFAULT_SOCKET_PATH), PathBuf::from)
}

/// Current wall-clock time in milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Returns the longest prefix of `value` that is at most `max_bytes` long and
/// ends on a character boundary.
pub fn truncate_to(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }

    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
