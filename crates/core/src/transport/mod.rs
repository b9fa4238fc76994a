//! Transport traits for APDU communication with cards
//!
//! A transport is the channel that carries raw bytes to the card and back.
//! It knows nothing about command structure, transform stages or
//! GET RESPONSE chaining.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

use crate::{Error, Response};

/// Transmission protocol requested for an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Character-oriented T=0
    T0,
    /// Block-oriented T=1
    T1,
    /// Raw reader access
    Raw,
}

/// Trait for card transports
///
/// Implementors provide connection management and `do_transmit_raw`; the
/// provided methods add tracing and response decoding.
pub trait CardTransport: Send + fmt::Debug {
    /// Error type returned by the transport
    type Error: Into<Error> + fmt::Debug;

    /// Connect to the card
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Send raw APDU bytes to card and return response bytes
    fn transmit_raw(
        &mut self,
        command: &[u8],
        protocol: Option<Protocol>,
    ) -> Result<Bytes, Self::Error> {
        trace!(command = %hex::encode_upper(command), ?protocol, "Transmitting raw command");
        let result = self.do_transmit_raw(command, protocol);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(
        &mut self,
        command: &[u8],
        protocol: Option<Protocol>,
    ) -> Result<Bytes, Self::Error>;

    /// Send raw APDU bytes and decode the answer into data and status word
    fn transmit(&mut self, command: &[u8], protocol: Option<Protocol>) -> Result<Response, Error> {
        let raw = self.transmit_raw(command, protocol).map_err(Into::into)?;
        Ok(Response::from_bytes(&raw)?)
    }

    /// Disconnect from the card
    fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Answer To Reset of the connected card
    fn identifier(&self) -> Option<Bytes>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    type Error = T::Error;

    fn connect(&mut self) -> Result<(), Self::Error> {
        (**self).connect()
    }

    fn transmit_raw(
        &mut self,
        command: &[u8],
        protocol: Option<Protocol>,
    ) -> Result<Bytes, Self::Error> {
        (**self).transmit_raw(command, protocol)
    }

    fn do_transmit_raw(
        &mut self,
        command: &[u8],
        protocol: Option<Protocol>,
    ) -> Result<Bytes, Self::Error> {
        (**self).do_transmit_raw(command, protocol)
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        (**self).disconnect()
    }

    fn identifier(&self) -> Option<Bytes> {
        (**self).identifier()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[cfg(test)]
pub(crate) use mock::MockTransport;

#[cfg(test)]
mod mock {
    use super::*;

    /// Mock transport for testing
    #[derive(Debug, Clone)]
    pub(crate) struct MockTransport {
        /// Mock responses to return, in order
        pub(crate) responses: Vec<Bytes>,
        /// Commands that were sent
        pub(crate) commands: Vec<Bytes>,
        /// Whether the transport is connected
        pub(crate) connected: bool,
        /// Echo each command back followed by this status instead of replaying responses
        pub(crate) echo: Option<(u8, u8)>,
    }

    impl MockTransport {
        /// Create a new mock transport with the given responses
        pub(crate) fn new(responses: Vec<Bytes>) -> Self {
            Self {
                responses,
                commands: Vec::new(),
                connected: true,
                echo: None,
            }
        }

        /// Create a new mock transport that always returns the given response
        pub(crate) fn with_response(response: Bytes) -> Self {
            Self::new(vec![response])
        }

        /// Create a mock transport that returns each command as data with a fixed status
        pub(crate) fn echo(sw1: u8, sw2: u8) -> Self {
            Self {
                echo: Some((sw1, sw2)),
                ..Self::new(Vec::new())
            }
        }
    }

    impl CardTransport for MockTransport {
        type Error = TransportError;

        fn connect(&mut self) -> Result<(), Self::Error> {
            self.connected = true;
            Ok(())
        }

        fn do_transmit_raw(
            &mut self,
            command: &[u8],
            _protocol: Option<Protocol>,
        ) -> Result<Bytes, Self::Error> {
            if !self.connected {
                return Err(TransportError::Connection);
            }

            self.commands.push(Bytes::copy_from_slice(command));

            if let Some((sw1, sw2)) = self.echo {
                let mut response = command.to_vec();
                response.extend_from_slice(&[sw1, sw2]);
                return Ok(Bytes::from(response));
            }

            // Either clone the single response or take the next one
            match self.responses.len() {
                0 => Err(TransportError::Transmission),
                1 => Ok(self.responses[0].clone()),
                _ => Ok(self.responses.remove(0)),
            }
        }

        fn disconnect(&mut self) -> Result<(), Self::Error> {
            self.connected = false;
            Ok(())
        }

        fn identifier(&self) -> Option<Bytes> {
            self.connected
                .then(|| Bytes::from_static(&[0x3B, 0x02, 0x14, 0x50]))
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::error::ResponseError;

    #[test]
    fn test_transmit_decodes_response() {
        let mut transport = MockTransport::with_response(Bytes::from_static(&[0x01, 0x90, 0x00]));
        let response = transport.transmit(&[0x00, 0xA4, 0x00, 0x00], None).unwrap();

        assert_eq!(response.data().as_ref(), &[0x01]);
        assert!(response.is_success());
        assert_eq!(transport.commands.len(), 1);
    }

    #[test]
    fn test_transmit_malformed_response() {
        let mut transport = MockTransport::with_response(Bytes::from_static(&[0x90]));
        let err = transport.transmit(&[0x00, 0xA4, 0x00, 0x00], None).unwrap_err();
        assert!(matches!(err, Error::Response(ResponseError::Malformed(1))));
    }

    #[test]
    fn test_transmit_disconnected() {
        let mut transport = MockTransport::echo(0x90, 0x00);
        transport.disconnect().unwrap();

        let err = transport.transmit(&[0x00, 0xA4, 0x00, 0x00], None).unwrap_err();
        assert!(err.is_transport());
        assert!(transport.identifier().is_none());
    }

    #[test]
    fn test_boxed_transport() {
        let mut transport: Box<MockTransport> = Box::new(MockTransport::echo(0x90, 0x00));
        let response = transport.transmit(&[0x00, 0xB2, 0x01, 0x0C], None).unwrap();
        assert_eq!(response.data().as_ref(), &[0x00, 0xB2, 0x01, 0x0C]);
        assert!(transport.is_connected());
    }
}
