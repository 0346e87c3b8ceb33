//! Packet framing for the EyeRobot protocol.
//!
//! Every datagram starts with a one-byte opcode. The rest of the datagram is
//! an opcode-specific payload with all multi-byte fields little-endian.
//!
//! ## Session (0x00), robot → controller
//!
//! ```text
//! +------+----------+--------+----------------------+
//! | 0x00 | reserved |  len   |  identifier (len B)  |
//! |      |   0x00   | 0..255 |  raw bytes, no NUL   |
//! +------+----------+--------+----------------------+
//! ```
//!
//! ## Info (0x02), robot → controller, 65 bytes
//!
//! ```text
//! offset  field                     type
//!      0  opcode 0x02               u8
//!      1  packet number             i64
//!      9  motor1..motor4            i32 × 4
//!     25  acceleration X, Y, Z      f32 × 3
//!     37  compass X, Y, Z           f32 × 3
//!     49  orientation X, Y, Z, W    f32 × 4
//! ```
//!
//! ## Command (0x03), controller → robot, 25 bytes
//!
//! ```text
//! offset  field                     type
//!      0  opcode 0x03               u8
//!      1  packet number             i64
//!      9  motor1..motor4            i32 × 4
//! ```
//!
//! Decoding reads the opcode, then only the fixed-width payload belonging to
//! it. Bytes past the payload are ignored; the Session length byte is the only
//! length field on the wire.

use tracing::trace;

use crate::codec::ByteBuffer;
use crate::types::{Command, InfoSample, MotorPowers, PacketNumber, Quaternion, Vector3};
use crate::{LinkError, Result};

/// Longest identifier a Session packet can carry.
pub const MAX_IDENTIFIER_LEN: usize = u8::MAX as usize;
/// Session packet bytes before the identifier.
pub const SESSION_HEADER_LEN: usize = 3;
/// Info payload length, excluding the opcode.
pub const INFO_PAYLOAD_LEN: usize = 64;
/// Info datagram length.
pub const INFO_PACKET_LEN: usize = INFO_PAYLOAD_LEN + 1;
/// Command payload length, excluding the opcode.
pub const COMMAND_PAYLOAD_LEN: usize = 24;
/// Command datagram length.
pub const COMMAND_PACKET_LEN: usize = COMMAND_PAYLOAD_LEN + 1;

/// Leading byte of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Session = 0x00,
    Info = 0x02,
    Command = 0x03,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Opcode::Session),
            0x02 => Some(Opcode::Info),
            0x03 => Some(Opcode::Command),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = LinkError;

    fn try_from(byte: u8) -> Result<Self> {
        Opcode::from_byte(byte).ok_or(LinkError::UnknownOpcode { opcode: byte })
    }
}

/// Session announcement carrying the robot's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPacket {
    identifier: String,
}

impl SessionPacket {
    /// Build a session packet, rejecting identifiers longer than 255 bytes.
    pub fn new(identifier: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(LinkError::IdentifierTooLong { len: identifier.len() });
        }
        Ok(Self { identifier })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Size of the encoded datagram.
    pub fn encoded_len(&self) -> usize {
        SESSION_HEADER_LEN + self.identifier.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut datagram = Vec::with_capacity(self.encoded_len());
        // Length fits in a u8, checked in new()
        datagram.extend_from_slice(&[
            Opcode::Session.as_byte(),
            0x00,
            self.identifier.len() as u8,
        ]);
        datagram.extend_from_slice(self.identifier.as_bytes());
        datagram
    }

    /// Decode a full session datagram, opcode included.
    ///
    /// The reserved byte must be zero and the identifier must be ASCII, which
    /// is how controllers read it; both checks turn away non-robot senders.
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        let (&opcode, _) = datagram.split_first().ok_or(LinkError::EmptyDatagram)?;
        if opcode != Opcode::Session.as_byte() {
            return Err(LinkError::UnexpectedPacket { opcode });
        }
        if datagram.len() < SESSION_HEADER_LEN {
            return Err(LinkError::Truncated {
                opcode,
                expected: SESSION_HEADER_LEN,
                actual: datagram.len(),
            });
        }
        if datagram[1] != 0x00 {
            return Err(LinkError::MalformedSession { reason: "reserved byte is not zero" });
        }

        let len = datagram[2] as usize;
        let name = datagram.get(SESSION_HEADER_LEN..SESSION_HEADER_LEN + len).ok_or(
            LinkError::Truncated {
                opcode,
                expected: SESSION_HEADER_LEN + len,
                actual: datagram.len(),
            },
        )?;
        if !name.is_ascii() {
            return Err(LinkError::MalformedSession { reason: "identifier is not ASCII" });
        }
        let identifier = name.iter().map(|&byte| char::from(byte)).collect();

        Ok(Self { identifier })
    }
}

/// Outbound telemetry report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfoPacket {
    pub number: PacketNumber,
    pub sample: InfoSample,
}

impl InfoPacket {
    pub fn new(number: PacketNumber, sample: InfoSample) -> Self {
        Self { number, sample }
    }

    /// Encode the 65-byte datagram.
    ///
    /// The payload is written field by field into its own 64-byte buffer and
    /// then spliced in after the opcode.
    pub fn encode(&self) -> Result<[u8; INFO_PACKET_LEN]> {
        let InfoSample { motors, acceleration, compass, orientation } = self.sample;

        let mut payload = ByteBuffer::new([0u8; INFO_PAYLOAD_LEN]);
        payload.put_i64_le(self.number)?;
        for power in motors.as_array() {
            payload.put_i32_le(power)?;
        }
        for axis in [acceleration.x, acceleration.y, acceleration.z] {
            payload.put_f32_le(axis)?;
        }
        for axis in [compass.x, compass.y, compass.z] {
            payload.put_f32_le(axis)?;
        }
        for component in [orientation.x, orientation.y, orientation.z, orientation.w] {
            payload.put_f32_le(component)?;
        }

        let mut datagram = [0u8; INFO_PACKET_LEN];
        datagram[0] = Opcode::Info.as_byte();
        payload.set_position(0)?;
        payload.copy_into(&mut datagram, 1, INFO_PAYLOAD_LEN)?;
        Ok(datagram)
    }

    /// Decode the 64-byte payload that follows the opcode.
    pub fn decode_payload(payload: &[u8]) -> Result<Self> {
        let mut buf = fixed_payload(Opcode::Info, payload, INFO_PAYLOAD_LEN)?;

        let number = buf.get_i64_le()?;
        let motors = read_motors(&mut buf)?;
        let acceleration = read_vector(&mut buf)?;
        let compass = read_vector(&mut buf)?;
        let orientation = Quaternion::new(
            buf.get_f32_le()?,
            buf.get_f32_le()?,
            buf.get_f32_le()?,
            buf.get_f32_le()?,
        );

        Ok(Self { number, sample: InfoSample { motors, acceleration, compass, orientation } })
    }
}

/// Inbound motor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    pub number: PacketNumber,
    pub command: Command,
}

impl CommandPacket {
    pub fn new(number: PacketNumber, command: Command) -> Self {
        Self { number, command }
    }

    /// Encode the 25-byte datagram. Controllers and test peers send these.
    pub fn encode(&self) -> Result<[u8; COMMAND_PACKET_LEN]> {
        let mut datagram = [0u8; COMMAND_PACKET_LEN];
        let mut buf = ByteBuffer::new(&mut datagram[..]);
        buf.put_u8(Opcode::Command.as_byte())?;
        buf.put_i64_le(self.number)?;
        for power in self.command.motors.as_array() {
            buf.put_i32_le(power)?;
        }
        Ok(datagram)
    }

    /// Decode the 24-byte payload that follows the opcode.
    pub fn decode_payload(payload: &[u8]) -> Result<Self> {
        let mut buf = fixed_payload(Opcode::Command, payload, COMMAND_PAYLOAD_LEN)?;
        let number = buf.get_i64_le()?;
        let motors = read_motors(&mut buf)?;
        Ok(Self { number, command: Command::from(motors) })
    }
}

/// Any decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Session(SessionPacket),
    Info(InfoPacket),
    Command(CommandPacket),
}

impl Packet {
    /// Decode a datagram by branching on its opcode.
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        let (&first, payload) = datagram.split_first().ok_or(LinkError::EmptyDatagram)?;
        let opcode = Opcode::try_from(first)?;
        trace!(?opcode, len = datagram.len(), "Decoding datagram");

        match opcode {
            Opcode::Session => SessionPacket::decode(datagram).map(Packet::Session),
            Opcode::Info => InfoPacket::decode_payload(payload).map(Packet::Info),
            Opcode::Command => CommandPacket::decode_payload(payload).map(Packet::Command),
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Packet::Session(_) => Opcode::Session,
            Packet::Info(_) => Opcode::Info,
            Packet::Command(_) => Opcode::Command,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Packet::Session(packet) => Ok(packet.encode()),
            Packet::Info(packet) => packet.encode().map(|bytes| bytes.to_vec()),
            Packet::Command(packet) => packet.encode().map(|bytes| bytes.to_vec()),
        }
    }
}

fn fixed_payload<'a>(
    opcode: Opcode,
    payload: &'a [u8],
    expected: usize,
) -> Result<ByteBuffer<&'a [u8]>> {
    if payload.len() < expected {
        return Err(LinkError::Truncated {
            opcode: opcode.as_byte(),
            expected,
            actual: payload.len(),
        });
    }
    ByteBuffer::with_range(payload, 0, expected)
}

fn read_motors(buf: &mut ByteBuffer<&[u8]>) -> Result<MotorPowers> {
    Ok(MotorPowers::new(buf.get_i32_le()?, buf.get_i32_le()?, buf.get_i32_le()?, buf.get_i32_le()?))
}

fn read_vector(buf: &mut ByteBuffer<&[u8]>) -> Result<Vector3> {
    Ok(Vector3::new(buf.get_f32_le()?, buf.get_f32_le()?, buf.get_f32_le()?))
}
