//! Error types for the EyeRobot link.
//!
//! All errors implement `std::error::Error` and carry enough context to log a
//! useful diagnostic without the caller re-deriving it.
//!
//! ## Error Categories
//!
//! - **Fatal**: the transport could not be created. Surfaced from
//!   construction; nothing in the crate retries it.
//! - **Caller misuse**: sending before `connect()` or after `disconnect()`.
//! - **Codec**: cursor writes or reads outside the buffer range. Packets are
//!   fixed-size, so these indicate a framing bug rather than bad input.
//! - **Per-datagram**: unknown opcodes, truncated payloads, unexpected packet
//!   kinds and stale packet numbers. The receive loop discards these and keeps
//!   going; they never reach the caller.
//! - **Configuration**: a config file that cannot be read, parsed or validated.
//!
//! ```rust
//! use eyerobot_link::LinkError;
//!
//! let error = LinkError::UnknownOpcode { opcode: 0x7F };
//! assert!(error.is_per_datagram());
//! assert!(!error.is_fatal());
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Failed to initialise UDP transport on {addr}")]
    TransportInit {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport {operation} failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection is not connected (state: {state:?})")]
    NotConnected { state: ConnectionState },

    #[error("Codec access of {width} bytes at position {position} exceeds buffer end {end}")]
    OutOfBounds { position: usize, width: usize, end: usize },

    #[error("Codec offset {offset} outside buffer range [{start}, {end}]")]
    InvalidOffset { offset: usize, start: usize, end: usize },

    #[error("Unknown opcode {opcode:#04x}")]
    UnknownOpcode { opcode: u8 },

    #[error("Unexpected inbound packet with opcode {opcode:#04x}")]
    UnexpectedPacket { opcode: u8 },

    #[error("Empty datagram")]
    EmptyDatagram,

    #[error("Malformed session packet: {reason}")]
    MalformedSession { reason: &'static str },

    #[error("Truncated packet {opcode:#04x}: expected {expected} bytes, got {actual}")]
    Truncated { opcode: u8, expected: usize, actual: usize },

    #[error("Stale packet number {number} (last accepted {last})")]
    StalePacket { number: i64, last: i64 },

    #[error("Identifier is {len} bytes, the session packet allows at most 255")]
    IdentifierTooLong { len: usize },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LinkError {
    /// Returns whether this error ends the connection's usefulness.
    ///
    /// Only transport construction is fatal; everything else leaves the
    /// connection (or the receive loop) usable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::TransportInit { .. })
    }

    /// Returns whether this error belongs to a single inbound datagram.
    ///
    /// The receive loop discards the datagram and continues on these.
    pub fn is_per_datagram(&self) -> bool {
        matches!(
            self,
            LinkError::EmptyDatagram
                | LinkError::MalformedSession { .. }
                | LinkError::UnknownOpcode { .. }
                | LinkError::UnexpectedPacket { .. }
                | LinkError::Truncated { .. }
                | LinkError::StalePacket { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::TransportInit { .. } => vec![
                "Check the bind address is valid for this host",
                "Ensure the local port is not already in use",
                "Verify the process may open UDP sockets",
            ],
            LinkError::Transport { .. } => vec![
                "Check the controller address is reachable",
                "Verify the network interface is up",
            ],
            LinkError::NotConnected { .. } => vec![
                "Call connect() before sending telemetry",
                "Create a new connection after disconnect()",
            ],
            LinkError::OutOfBounds { .. } | LinkError::InvalidOffset { .. } => vec![
                "Check the packet layout constants against the buffer size",
                "Report this as a framing bug",
            ],
            LinkError::UnknownOpcode { .. } | LinkError::UnexpectedPacket { .. } => vec![
                "Verify the controller speaks the same protocol revision",
                "Check for other senders targeting this port",
            ],
            LinkError::EmptyDatagram | LinkError::MalformedSession { .. } => vec![
                "Check for other senders targeting this port",
                "Verify the sender's session encoder",
            ],
            LinkError::Truncated { .. } => vec![
                "Increase recv_buffer_size if it is below the packet size",
                "Check the controller's packet encoder",
            ],
            LinkError::StalePacket { .. } => {
                vec!["No action needed; the controller has already sent a newer command"]
            }
            LinkError::IdentifierTooLong { .. } => vec!["Use a robot name of at most 255 bytes"],
            LinkError::Config { .. } => vec![
                "Check the configuration file exists and is valid YAML",
                "Verify remote_ip, remote_port and name are set",
            ],
        }
    }

    /// Helper constructor for transport construction failures.
    pub fn transport_init(addr: SocketAddr, source: std::io::Error) -> Self {
        LinkError::TransportInit { addr, source }
    }

    /// Helper constructor for transport failures after construction.
    pub fn transport(operation: &'static str, source: std::io::Error) -> Self {
        LinkError::Transport { operation, source }
    }

    /// Helper constructor for configuration validation errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        LinkError::Config { reason: reason.into(), path: None, source: None }
    }

    /// Helper constructor for configuration errors tied to a file.
    pub fn config_file_error(
        path: PathBuf,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Config { reason: reason.into(), path: Some(path), source: Some(source) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn messages_carry_their_context(
            opcode in any::<u8>(),
            number in any::<i64>(),
            last in any::<i64>(),
            position in 0usize..4096,
            width in 1usize..9,
            reason in "[a-z ]{1,40}"
          ) {
            let unknown = LinkError::UnknownOpcode { opcode };
            let hex = format!("{:#04x}", opcode);
            prop_assert!(unknown.to_string().contains(&hex));

            let stale = LinkError::StalePacket { number, last };
            let stale_msg = stale.to_string();
            prop_assert!(stale_msg.contains(&number.to_string()));
            prop_assert!(stale_msg.contains(&last.to_string()));

            let bounds = LinkError::OutOfBounds { position, width, end: position };
            prop_assert!(bounds.to_string().contains(&position.to_string()));

            let config = LinkError::config_error(reason.clone());
            prop_assert!(config.to_string().contains(&reason));
          }
        }
    }

    #[test]
    fn only_transport_init_is_fatal() {
        let addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
        let init = LinkError::transport_init(addr, std::io::Error::other("denied"));
        assert!(init.is_fatal());
        assert!(!init.is_per_datagram());

        let not_connected = LinkError::NotConnected { state: ConnectionState::Created };
        assert!(!not_connected.is_fatal());

        let stale = LinkError::StalePacket { number: 3, last: 5 };
        assert!(!stale.is_fatal());
        assert!(stale.is_per_datagram());
    }

    #[test]
    fn per_datagram_classification() {
        assert!(LinkError::UnknownOpcode { opcode: 0x7F }.is_per_datagram());
        assert!(LinkError::UnexpectedPacket { opcode: 0x02 }.is_per_datagram());
        assert!(LinkError::Truncated { opcode: 0x03, expected: 24, actual: 3 }.is_per_datagram());
        assert!(LinkError::EmptyDatagram.is_per_datagram());
        assert!(!LinkError::IdentifierTooLong { len: 300 }.is_per_datagram());
        assert!(!LinkError::OutOfBounds { position: 0, width: 8, end: 4 }.is_per_datagram());
    }

    #[test]
    fn error_traits_validation() {
        // LinkError crosses task boundaries with the receive loop
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LinkError>();

        let error = LinkError::config_error("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn source_chain_is_preserved() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let error = LinkError::transport_init(
            addr,
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "port busy"),
        );

        let source = std::error::Error::source(&error).expect("io source");
        assert_eq!(source.to_string(), "port busy");
        assert!(error.to_string().contains("127.0.0.1:9"));
    }

    #[test]
    fn every_variant_has_suggestions() {
        let addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
        let errors = vec![
            LinkError::transport_init(addr, std::io::Error::other("x")),
            LinkError::transport("send", std::io::Error::other("x")),
            LinkError::NotConnected { state: ConnectionState::Disconnected },
            LinkError::OutOfBounds { position: 0, width: 4, end: 0 },
            LinkError::InvalidOffset { offset: 9, start: 0, end: 4 },
            LinkError::UnknownOpcode { opcode: 0x7F },
            LinkError::UnexpectedPacket { opcode: 0x00 },
            LinkError::Truncated { opcode: 0x03, expected: 24, actual: 0 },
            LinkError::EmptyDatagram,
            LinkError::MalformedSession { reason: "reserved byte set" },
            LinkError::StalePacket { number: 1, last: 2 },
            LinkError::IdentifierTooLong { len: 256 },
            LinkError::config_error("x"),
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error:?}");
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }
}
