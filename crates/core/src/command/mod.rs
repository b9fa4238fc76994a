//! APDU command definitions
//!
//! This module provides the command type and the short-APDU encoder
//! according to ISO/IEC 7816-4.

pub mod error;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use error::CommandError;

/// Expected length type for APDU commands
pub type ExpectedLength = u8;

/// Maximum data length of a short APDU
pub const MAX_DATA_LENGTH: usize = u8::MAX as usize;

/// SELECT instruction
pub const INS_SELECT: u8 = 0xA4;
/// READ RECORD instruction
pub const INS_READ_RECORD: u8 = 0xB2;
/// GET RESPONSE instruction
pub const INS_GET_RESPONSE: u8 = 0xC0;

/// Encode a command header and optional data field into raw APDU bytes
///
/// The layout is `[cla, ins, p1, p2, (len(data), data...)?]`.
///
/// # Errors
/// Returns [`CommandError::DataTooLong`] if `data` exceeds 255 bytes.
pub fn encode(cla: u8, ins: u8, p1: u8, p2: u8, data: Option<&[u8]>) -> Result<Bytes, CommandError> {
    let command = match data {
        Some(data) => Command::new_with_data(cla, ins, p1, p2, Bytes::copy_from_slice(data))?,
        None => Command::new(cla, ins, p1, p2),
    };
    Ok(command.to_bytes())
}

/// Generic APDU command structure
///
/// Commands are immutable once built; the data field is validated on
/// construction so that serialization cannot fail.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Option<Bytes>,
    le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: ExpectedLength) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
    ) -> Result<Self, CommandError> {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Result<Self, CommandError> {
        let data = data.into();
        if data.len() > MAX_DATA_LENGTH {
            return Err(CommandError::data_too_long(data.len(), MAX_DATA_LENGTH));
        }
        self.data = Some(data);
        Ok(self)
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command payload data
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Expected response length
    pub const fn expected_length(&self) -> Option<ExpectedLength> {
        self.le
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        // Header (CLA, INS, P1, P2) is always 4 bytes
        let mut length = 4;
        if let Some(data) = &self.data {
            length += 1 + data.len();
        }
        if self.le.is_some() {
            length += 1;
        }
        length
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        // Length was checked when the data was attached
        if let Some(data) = &self.data {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        trace!(command = %hex::encode_upper(&buffer), "Encoded APDU command");
        buffer.freeze()
    }

    /// Parse a short command from raw bytes (cases 1 to 4)
    pub fn from_bytes(data: &[u8]) -> Result<Self, CommandError> {
        if data.len() < 4 {
            return Err(CommandError::InvalidLength(data.len()));
        }

        let mut command = Self::new(data[0], data[1], data[2], data[3]);
        if data.len() == 4 {
            return Ok(command);
        }

        // A single byte after the header is Le
        if data.len() == 5 {
            command.le = Some(data[4]);
            return Ok(command);
        }

        let lc = data[4] as usize;
        let body = &data[5..];
        if body.len() == lc {
            command.data = Some(Bytes::copy_from_slice(body));
        } else if body.len() == lc + 1 {
            command.data = Some(Bytes::copy_from_slice(&body[..lc]));
            command.le = Some(body[lc]);
        } else {
            return Err(CommandError::InvalidLength(data.len()));
        }

        Ok(command)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("cla", &format_args!("{:#04x}", self.cla))
            .field("ins", &format_args!("{:#04x}", self.ins))
            .field("p1", &format_args!("{:#04x}", self.p1))
            .field("p2", &format_args!("{:#04x}", self.p2))
            .field("data", &self.data.as_ref().map(hex::encode_upper))
            .field("le", &self.le)
            .finish()
    }
}

impl From<Command> for Bytes {
    fn from(command: Command) -> Self {
        command.to_bytes()
    }
}
