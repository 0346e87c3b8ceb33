//! Client endpoint of the EyeRobot UDP telemetry and control protocol.
//!
//! A robot announces itself to a controller with a session packet, then
//! streams telemetry (motor powers, acceleration, compass, orientation) while
//! the controller streams motor commands back. Every datagram is
//! self-contained and little-endian; commands that arrive out of order are
//! dropped by packet number before they reach control logic.
//!
//! # Features
//!
//! - **Wire codec**: bit-exact encode/decode of Session, Info and Command packets
//! - **Staleness filter**: lock-free packet-number sequencing shared by both directions
//! - **Async receive task**: commands delivered to a closure or a bounded `Stream`
//! - **Paced reporting**: latest-wins telemetry at a fixed rate
//! - **Pluggable transport**: real UDP, or an in-memory pair for tests
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use eyerobot_link::{ClientConfig, Command, EyeRobot, InfoSample};
//!
//! #[tokio::main]
//! async fn main() -> eyerobot_link::Result<()> {
//!     let config = ClientConfig::new("192.168.1.20:5000".parse().unwrap(), "eye-bot-1");
//!     let mut connection = EyeRobot::connect(&config, |command: Command| {
//!         println!("motors: {}", command.motors);
//!     })
//!     .await?;
//!
//!     connection.send_info(&InfoSample::default()).await?;
//!     connection.disconnect().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod codec;
pub mod config;
mod error;
pub mod logging;
pub mod packet;
pub mod sequencer;
pub mod types;

// Session and I/O
pub mod connection;
pub mod handler;
pub mod telemetry;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState, InfoSender, ReceiveStats, Session};
pub use handler::{CommandHandler, CommandQueue};
pub use packet::{CommandPacket, InfoPacket, Opcode, Packet, SessionPacket};
pub use sequencer::Sequencer;
pub use telemetry::InfoReporter;
pub use transport::{Transport, UdpTransport};

/// Entry point for robot connections.
///
/// Binds a UDP socket, announces the session and returns a connected
/// [`Connection`] in one step. Use [`Connection::bind`] or
/// [`Connection::with_transport`] to control the steps individually.
pub struct EyeRobot;

impl EyeRobot {
    /// Bind, connect and start receiving commands.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails validation
    /// - The local socket cannot be bound
    /// - The session packet cannot be sent
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use eyerobot_link::{ClientConfig, EyeRobot, CommandQueue};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> eyerobot_link::Result<()> {
    /// let config = ClientConfig::new("127.0.0.1:5000".parse().unwrap(), "bot1");
    /// let (queue, _commands) = CommandQueue::bounded(32);
    /// let connection = EyeRobot::connect(&config, queue).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        config: &ClientConfig,
        handler: impl CommandHandler,
    ) -> Result<Connection<UdpTransport>> {
        let mut connection = Connection::bind(config, handler).await?;
        connection.connect().await?;
        Ok(connection)
    }

    /// Load a YAML config file, install logging per its `log_filter`, then
    /// [`connect`](Self::connect).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use eyerobot_link::{Command, EyeRobot};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> eyerobot_link::Result<()> {
    /// let connection = EyeRobot::from_config_file("robot.yaml", |_: Command| {}).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_config_file<P: AsRef<std::path::Path>>(
        path: P,
        handler: impl CommandHandler,
    ) -> Result<Connection<UdpTransport>> {
        let config = ClientConfig::load(path)?;
        logging::try_init_from_config(&config);
        Self::connect(&config, handler).await
    }
}
