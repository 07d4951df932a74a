use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::distribution::registry::DEFAULT_CAPACITY;
use crate::proxy::DEFAULT_PROXY_PORT;
use crate::util::ingress_port_for;

/// Service configuration shared by the server and the supervisor.
///
/// Every field has a default, so an empty object (or no file at all) is a
/// valid configuration.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ServerConfig {
    /// Address both listeners bind to
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// Port subscribers connect to
    #[serde(default = "crate::util::get_port")]
    pub egress_port: u16,

    /// Port supervisors deliver alerts to, right above `egress_port` when
    /// unset
    #[serde(default)]
    pub ingress_port: Option<u16>,

    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,

    /// Number of subscriber slots
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
}

impl ServerConfig {
    pub fn ingress_port(&self) -> u16 {
        self.ingress_port.unwrap_or_else(|| ingress_port_for(self.egress_port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            egress_port: crate::util::get_port(),
            ingress_port: None,
            audit_log: default_audit_log(),
            max_subscribers: default_max_subscribers(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SupervisorConfig {
    /// Host running the distribution service
    #[serde(default = "crate::util::get_host")]
    pub server: IpAddr,

    #[serde(default = "default_ingress_port")]
    pub ingress_port: u16,

    /// Threshold rule file
    #[serde(default = "default_thresholds")]
    pub thresholds: PathBuf,

    /// Socket path of the metric transport
    #[serde(default = "crate::util::get_socket_path")]
    pub socket: PathBuf,

    /// Pause after a failed receive, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl SupervisorConfig {
    pub fn ingress_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server, self.ingress_port)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            server: crate::util::get_host(),
            ingress_port: default_ingress_port(),
            thresholds: default_thresholds(),
            socket: crate::util::get_socket_path(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// WebSocket bridge settings
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProxyConfig {
    /// Address web clients connect to
    #[serde(default = "default_proxy_listen")]
    pub listen: SocketAddr,

    /// Host running the distribution service
    #[serde(default = "crate::util::get_host")]
    pub server: IpAddr,

    /// Subscriber port of the distribution service
    #[serde(default = "crate::util::get_port")]
    pub egress_port: u16,
}

impl ProxyConfig {
    pub fn upstream(&self) -> SocketAddr {
        SocketAddr::new(self.server, self.egress_port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: default_proxy_listen(),
            server: crate::util::get_host(),
            egress_port: crate::util::get_port(),
        }
    }
}

fn default_proxy_listen() -> SocketAddr {
    SocketAddr::new(default_bind(), DEFAULT_PROXY_PORT)
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_ingress_port() -> u16 {
    ingress_port_for(crate::util::get_port())
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("./faultline.log")
}

fn default_max_subscribers() -> usize {
    DEFAULT_CAPACITY
}

fn default_thresholds() -> PathBuf {
    PathBuf::from("./faultline.conf")
}

fn default_retry_delay_ms() -> u64 {
    1000
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
