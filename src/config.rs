//! Client configuration.
//!
//! Configuration is plain data loaded once at startup, usually from YAML:
//!
//! ```yaml
//! remote_ip: 192.168.1.20
//! remote_port: 5000
//! name: eye-bot-1
//! recv_buffer_size: 1024
//! read_timeout_ms: 500
//! log_filter: eyerobot_link=debug
//! ```
//!
//! Only `remote_ip`, `remote_port` and `name` are required.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::packet::{COMMAND_PACKET_LEN, MAX_IDENTIFIER_LEN};
use crate::{LinkError, Result};

const DEFAULT_RECV_BUFFER_SIZE: usize = 1024;
const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Settings for one robot connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Controller address
    pub remote_ip: IpAddr,

    /// Controller UDP port
    pub remote_port: u16,

    /// Robot display name sent in the session packet, ASCII only
    pub name: String,

    /// Bytes reserved for each inbound datagram
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    /// Upper bound on a single receive wait. Only affects how quickly the
    /// receive task notices shutdown; the protocol has no timeouts.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Local address to bind
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// `tracing` filter directive used by [`crate::logging`]
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

impl ClientConfig {
    /// Configuration with defaults for everything but the controller and name.
    pub fn new(remote: SocketAddr, name: impl Into<String>) -> Self {
        Self {
            remote_ip: remote.ip(),
            remote_port: remote.port(),
            name: name.into(),
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            bind_addr: default_bind_addr(),
            log_filter: None,
        }
    }

    /// Parse and validate YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| LinkError::Config {
            reason: format!("failed to parse YAML: {e}"),
            path: None,
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            LinkError::config_file_error(path.to_path_buf(), "failed to read file", Box::new(e))
        })?;

        Self::from_yaml_str(&yaml).map_err(|err| match err {
            LinkError::Config { reason, path: None, source } => {
                LinkError::Config { reason, path: Some(path.to_path_buf()), source }
            }
            other => other,
        })
    }

    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(LinkError::config_error("name must not be empty"));
        }
        if self.name.len() > MAX_IDENTIFIER_LEN {
            return Err(LinkError::config_error(format!(
                "name is {} bytes, at most {} allowed",
                self.name.len(),
                MAX_IDENTIFIER_LEN
            )));
        }
        if !self.name.is_ascii() {
            return Err(LinkError::config_error("name must be ASCII"));
        }
        if self.remote_port == 0 {
            return Err(LinkError::config_error("remote_port must not be 0"));
        }
        if self.recv_buffer_size < COMMAND_PACKET_LEN {
            return Err(LinkError::config_error(format!(
                "recv_buffer_size {} is smaller than a command packet ({} bytes)",
                self.recv_buffer_size, COMMAND_PACKET_LEN
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(LinkError::config_error("read_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Controller endpoint.
    pub fn remote_addr(&self) -> SocketAddr {
        SocketAddr::new(self.remote_ip, self.remote_port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
