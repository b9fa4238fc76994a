//! Card session issuing the ISO7816-4 instructions used for discovery
//!
//! A session owns its transport (possibly wrapped in transform stages) and
//! the class byte used for every command it builds. Responses are returned
//! as the card sent them; a `61 XX` or `9F XX` status is never followed
//! automatically. Callers that want the remaining bytes use
//! [`CardSession::fetch_remaining`].

use bytes::Bytes;
use tracing::{Level, debug, instrument, warn};

use crate::command::{Command, INS_GET_RESPONSE, INS_READ_RECORD, INS_SELECT};
use crate::transport::CardTransport;
use crate::{Error, Response, Result};

/// Default class byte for interindustry commands
pub const DEFAULT_CLA: u8 = 0x00;

/// Stateful conversation with one card
#[derive(Debug)]
pub struct CardSession<T: CardTransport> {
    transport: T,
    cla: u8,
}

impl<T: CardTransport> CardSession<T> {
    /// Create a session using CLA `00`
    pub const fn new(transport: T) -> Self {
        Self::with_class(transport, DEFAULT_CLA)
    }

    /// Create a session using a specific class byte (e.g. `A0` for GSM SIMs)
    pub const fn with_class(transport: T, cla: u8) -> Self {
        Self { transport, cla }
    }

    /// Class byte used for every command
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// End the session and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Connect the underlying transport
    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect().map_err(Into::into)
    }

    /// Disconnect the underlying transport
    pub fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().map_err(Into::into)
    }

    /// Answer To Reset of the connected card
    pub fn identifier(&self) -> Option<Bytes> {
        self.transport.identifier()
    }

    /// Send a command and decode the response
    ///
    /// Transport errors are returned as-is and never retried.
    pub fn transmit(&mut self, command: &Command) -> Result<Response> {
        let response = self.transport.transmit(&command.to_bytes(), None)?;
        let status = response.status();
        let ins = command.instruction();
        let len = response.data().len();
        if status.tracing_level() == Level::WARN {
            warn!(ins, %status, len, "{}", status.description());
        } else {
            debug!(ins, %status, len, description = status.description(), "Command completed");
        }
        Ok(response)
    }

    /// SELECT a file or application by identifier
    #[instrument(level = "debug", skip(self), fields(id = %hex::encode_upper(id)))]
    pub fn select(&mut self, id: &[u8]) -> Result<Response> {
        let command = Command::new_with_data(self.cla, INS_SELECT, 0x00, 0x00, Bytes::copy_from_slice(id))?;
        self.transmit(&command)
    }

    /// READ RECORD `index` from the elementary file with short identifier `sfi`
    pub fn read_record(&mut self, index: u8, sfi: u8) -> Result<Response> {
        let p2 = ((sfi & 0x1F) << 3) | 0x04;
        let command = Command::new(self.cla, INS_READ_RECORD, index, p2);
        self.transmit(&command)
    }

    /// GET RESPONSE for `le` pending bytes
    pub fn get_response(&mut self, le: u8) -> Result<Response> {
        let command = Command::new_with_le(self.cla, INS_GET_RESPONSE, 0x00, 0x00, le);
        self.transmit(&command)
    }

    /// Follow continuation statuses with GET RESPONSE until the card is done
    ///
    /// Data of every hop is appended to `response`; the final status word is
    /// the one of the last GET RESPONSE. Fails with
    /// [`Error::ChainLimitExceeded`] if the card still signals pending data
    /// after `max_chain` hops.
    pub fn fetch_remaining(&mut self, mut response: Response, max_chain: usize) -> Result<Response> {
        let mut hops = 0;
        while let Some(le) = response.continuation_length() {
            if hops == max_chain {
                return Err(Error::ChainLimitExceeded(hops));
            }
            debug!(pending = le, hop = hops + 1, "Fetching remaining response data");
            let next = self.get_response(le)?;
            response = response.chain(next);
            hops += 1;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_select_with_gsm_class() {
        let transport = MockTransport::new(vec![
            Bytes::from_static(&[0x9F, 0x16]),
            Bytes::from_static(&[0x00, 0x00, 0x7F, 0x10, 0x90, 0x00]),
        ]);
        let mut session = CardSession::with_class(transport, 0xA0);

        let response = session.select(&[0x7F, 0x10]).unwrap();
        assert_eq!(response.continuation_length(), Some(0x16));

        let response = session.get_response(0x16).unwrap();
        assert!(response.is_success());

        let commands = &session.transport().commands;
        assert_eq!(commands[0].as_ref(), &[0xA0, 0xA4, 0x00, 0x00, 0x02, 0x7F, 0x10]);
        assert_eq!(commands[1].as_ref(), &[0xA0, 0xC0, 0x00, 0x00, 0x16]);
    }

    #[test]
    fn test_read_record_encoding() {
        let mut session = CardSession::new(MockTransport::echo(0x90, 0x00));

        let response = session.read_record(1, 1).unwrap();
        assert_eq!(response.data().as_ref(), &[0x00, 0xB2, 0x01, 0x0C]);

        let response = session.read_record(3, 2).unwrap();
        assert_eq!(response.data().as_ref(), &[0x00, 0xB2, 0x03, 0x14]);
    }

    #[test]
    fn test_record_not_found_is_returned() {
        let transport = MockTransport::with_response(Bytes::from_static(&[0x6A, 0x83]));
        let mut session = CardSession::new(transport);

        let response = session.read_record(4, 1).unwrap();
        assert!(response.status().is_record_not_found());
        assert!(response.data().is_empty());
    }

    #[test]
    fn test_select_data_too_long() {
        let mut session = CardSession::new(MockTransport::echo(0x90, 0x00));
        let err = session.select(&[0u8; 256]).unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert!(session.transport().commands.is_empty());
    }

    #[test]
    fn test_fetch_remaining_concatenates() {
        let transport = MockTransport::new(vec![
            Bytes::from_static(&[0x01, 0x02, 0x61, 0x02]),
            Bytes::from_static(&[0x03, 0x04, 0x90, 0x00]),
        ]);
        let mut session = CardSession::new(transport);

        let first = session.transmit(&Command::new(0x00, 0xB2, 0x01, 0x0C)).unwrap();
        assert_eq!(first.continuation_length(), Some(0x02));

        let full = session.fetch_remaining(first, 4).unwrap();
        assert!(full.is_success());
        assert_eq!(full.data().as_ref(), &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(session.transport().commands[1].as_ref(), &[0x00, 0xC0, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_fetch_remaining_chain_limit() {
        // Single response replayed forever: the card never stops asking
        let transport = MockTransport::with_response(Bytes::from_static(&[0xAA, 0x61, 0x01]));
        let mut session = CardSession::new(transport);

        let first = session.get_response(0x01).unwrap();
        let err = session.fetch_remaining(first, 3).unwrap_err();
        assert!(matches!(err, Error::ChainLimitExceeded(3)));
        assert_eq!(session.transport().commands.len(), 4);
    }

    #[test]
    fn test_transport_errors_surface() {
        let mut transport = MockTransport::echo(0x90, 0x00);
        transport.connected = false;
        let mut session = CardSession::new(transport);

        assert!(session.read_record(1, 1).unwrap_err().is_transport());
        session.connect().unwrap();
        assert!(session.read_record(1, 1).is_ok());
        assert!(session.identifier().is_some());
    }
}
