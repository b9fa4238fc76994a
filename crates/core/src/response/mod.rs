//! APDU response definitions
//!
//! This module provides the response type and the decoder according to
//! ISO/IEC 7816-4.

pub mod error;
pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::Error;
use error::ResponseError;
use status::StatusWord;

/// Decode raw response bytes into a [`Response`]
///
/// The last two bytes are the status word, everything before is data.
///
/// # Errors
/// Returns [`ResponseError::Malformed`] if fewer than two bytes are given.
pub fn decode(data: &[u8]) -> Result<Response, ResponseError> {
    Response::from_bytes(data)
}

/// Split raw response bytes into data and the trailing status word
///
/// # Errors
/// Returns [`ResponseError::Malformed`] if fewer than two bytes are given.
pub fn split_status(raw: &[u8]) -> Result<(&[u8], StatusWord), ResponseError> {
    match raw {
        [data @ .., sw1, sw2] => Ok((data, StatusWord::new(*sw1, *sw2))),
        _ => Err(ResponseError::Malformed(raw.len())),
    }
}

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data, possibly empty
    data: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with data and status
    pub fn new(data: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            data: data.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub const fn success(data: Bytes) -> Self {
        Self {
            data,
            status: StatusWord::new(0x90, 0x00),
        }
    }

    /// Create a response carrying only a status word
    pub fn status_only(status: impl Into<StatusWord>) -> Self {
        Self::new(Bytes::new(), status)
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self, ResponseError> {
        let (payload, status) = split_status(data)?;

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            data: Bytes::copy_from_slice(payload),
            status,
        })
    }

    /// Response data field
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Take ownership of the data field
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Status word as a tuple (SW1, SW2)
    pub const fn status_tuple(&self) -> (u8, u8) {
        (self.status.sw1, self.status.sw2)
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Number of bytes the card signals as pending (61 XX / 9F XX)
    pub const fn continuation_length(&self) -> Option<u8> {
        self.status.continuation_length()
    }

    /// Append the data of a follow-up response and adopt its status word
    ///
    /// Used when reassembling a response across GET RESPONSE continuations.
    pub fn chain(self, next: Self) -> Self {
        if self.data.is_empty() {
            return next;
        }
        let mut buffer = BytesMut::with_capacity(self.data.len() + next.data.len());
        buffer.put_slice(&self.data);
        buffer.put_slice(&next.data);
        Self {
            data: buffer.freeze(),
            status: next.status,
        }
    }

    /// Turn a non-success status into [`Error::UnexpectedStatus`]
    pub fn expect_success(self, operation: &'static str) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::unexpected_status(self.status, operation))
        }
    }

    /// Serialize back to raw bytes (data followed by SW1 SW2)
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 2);
        buf.put_slice(&self.data);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = ResponseError;

    fn try_from(data: &[u8]) -> Result<Self, ResponseError> {
        Self::from_bytes(data)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}
