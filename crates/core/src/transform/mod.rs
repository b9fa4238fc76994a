//! Transform stages wrapped around a card transport
//!
//! A [`SecureChannel`] applies an outbound transform to every command before
//! it reaches the wrapped transport and an inbound transform to the data of
//! every response. Status words pass through untouched. Since a
//! `SecureChannel` is itself a [`CardTransport`], stages nest:
//!
//! ```
//! use emvscan_apdu_core::{Identity, TracingTransform, TransportExt};
//! # use emvscan_apdu_core::{Bytes, CardTransport, Protocol, transport::TransportError};
//! # #[derive(Debug)]
//! # struct Loopback;
//! # impl CardTransport for Loopback {
//! #     type Error = TransportError;
//! #     fn connect(&mut self) -> Result<(), TransportError> { Ok(()) }
//! #     fn do_transmit_raw(&mut self, _: &[u8], _: Option<Protocol>) -> Result<Bytes, TransportError> {
//! #         Ok(Bytes::from_static(&[0x90, 0x00]))
//! #     }
//! #     fn disconnect(&mut self) -> Result<(), TransportError> { Ok(()) }
//! #     fn identifier(&self) -> Option<Bytes> { None }
//! #     fn is_connected(&self) -> bool { true }
//! # }
//! let mut channel = Loopback.wrap(Identity).wrap(TracingTransform);
//! let response = channel.transmit(&[0x00, 0xA4, 0x00, 0x00], None).unwrap();
//! assert!(response.is_success());
//! ```

pub mod error;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::Error;
use crate::response::split_status;
use crate::transport::{CardTransport, Protocol};
use error::TransformError;

/// A pair of byte transforms applied around a transport
///
/// Both directions default to identity. Transforms must not block.
pub trait Transform: Send + fmt::Debug {
    /// Transform command bytes before they are sent
    fn outbound(&mut self, command: &[u8]) -> Result<Bytes, TransformError> {
        Ok(Bytes::copy_from_slice(command))
    }

    /// Transform response data (without status word) after it is received
    fn inbound(&mut self, data: &[u8]) -> Result<Bytes, TransformError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Transform that passes bytes through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {}

/// Identity transform that logs the bytes it would cipher and decipher
///
/// Stands in for a real secure messaging implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransform;

impl Transform for TracingTransform {
    fn outbound(&mut self, command: &[u8]) -> Result<Bytes, TransformError> {
        debug!(bytes = %hex::encode_upper(command), "Ciphering command");
        Ok(Bytes::copy_from_slice(command))
    }

    fn inbound(&mut self, data: &[u8]) -> Result<Bytes, TransformError> {
        debug!(bytes = %hex::encode_upper(data), "Deciphering response");
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Transport decorator running every exchange through a [`Transform`]
#[derive(Debug)]
pub struct SecureChannel<T, X = Identity> {
    inner: T,
    transform: X,
}

impl<T: CardTransport, X: Transform> SecureChannel<T, X> {
    /// Wrap a transport with a transform stage
    pub const fn new(inner: T, transform: X) -> Self {
        Self { inner, transform }
    }

    /// Get a reference to the wrapped transport
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    /// Get a reference to the transform
    pub const fn transform(&self) -> &X {
        &self.transform
    }

    /// Remove the stage and return the wrapped transport
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: CardTransport, X: Transform> CardTransport for SecureChannel<T, X> {
    type Error = Error;

    fn connect(&mut self) -> Result<(), Self::Error> {
        self.inner.connect().map_err(Into::into)
    }

    fn do_transmit_raw(
        &mut self,
        command: &[u8],
        protocol: Option<Protocol>,
    ) -> Result<Bytes, Self::Error> {
        let protected = self.transform.outbound(command)?;
        let raw = self
            .inner
            .transmit_raw(&protected, protocol)
            .map_err(Into::into)?;

        let (data, status) = split_status(&raw)?;
        if data.is_empty() {
            return Ok(raw);
        }

        let data = self.transform.inbound(data)?;
        let mut buffer = BytesMut::with_capacity(data.len() + 2);
        buffer.put_slice(&data);
        buffer.put_u8(status.sw1);
        buffer.put_u8(status.sw2);
        Ok(buffer.freeze())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.inner.disconnect().map_err(Into::into)
    }

    fn identifier(&self) -> Option<Bytes> {
        self.inner.identifier()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

/// Extension trait for wrapping transports in transform stages
pub trait TransportExt: CardTransport + Sized {
    /// Wrap this transport with a transform stage
    fn wrap<X: Transform>(self, transform: X) -> SecureChannel<Self, X> {
        SecureChannel::new(self, transform)
    }
}

impl<T: CardTransport> TransportExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::error::ResponseError;
    use crate::transport::MockTransport;

    /// XORs every byte with a fixed key in both directions
    #[derive(Debug)]
    struct XorTransform(u8);

    impl Transform for XorTransform {
        fn outbound(&mut self, command: &[u8]) -> Result<Bytes, TransformError> {
            Ok(command.iter().map(|b| b ^ self.0).collect())
        }

        fn inbound(&mut self, data: &[u8]) -> Result<Bytes, TransformError> {
            Ok(data.iter().map(|b| b ^ self.0).collect())
        }
    }

    /// Rejects any response data
    #[derive(Debug)]
    struct RejectInbound;

    impl Transform for RejectInbound {
        fn inbound(&mut self, _data: &[u8]) -> Result<Bytes, TransformError> {
            Err(TransformError::Inbound("bad MAC"))
        }
    }

    const COMMAND: [u8; 7] = [0x00, 0xA4, 0x04, 0x00, 0x02, 0x3F, 0x00];

    #[test]
    fn test_nested_identity_matches_plain_transport() {
        let response = Bytes::from_static(&[0x6F, 0x01, 0x02, 0x90, 0x00]);

        let mut plain = MockTransport::with_response(response.clone());
        let plain_response = plain.transmit(&COMMAND, None).unwrap();

        let mut wrapped = MockTransport::with_response(response)
            .wrap(Identity)
            .wrap(Identity);
        let wrapped_response = wrapped.transmit(&COMMAND, None).unwrap();

        assert_eq!(plain_response, wrapped_response);
        assert_eq!(plain.commands, wrapped.inner().inner().commands);
    }

    #[test]
    fn test_status_word_is_never_transformed() {
        let mut channel = MockTransport::echo(0x61, 0x10).wrap(XorTransform(0xFF));
        let response = channel.transmit(&[0x00, 0xB2, 0x01, 0x0C], None).unwrap();

        // The card saw the protected command
        assert_eq!(
            channel.inner().commands[0].as_ref(),
            &[0xFF, 0x4D, 0xFE, 0xF3]
        );
        // Echoed data is unprotected again, status left alone
        assert_eq!(response.data().as_ref(), &[0x00, 0xB2, 0x01, 0x0C]);
        assert_eq!(response.status_tuple(), (0x61, 0x10));
    }

    #[test]
    fn test_inbound_skipped_for_empty_data() {
        let mut channel =
            MockTransport::with_response(Bytes::from_static(&[0x6A, 0x83])).wrap(RejectInbound);
        let response = channel.transmit(&COMMAND, None).unwrap();
        assert_eq!(response.status_tuple(), (0x6A, 0x83));
    }

    #[test]
    fn test_transform_errors_propagate() {
        let mut channel = MockTransport::with_response(Bytes::from_static(&[0x01, 0x90, 0x00]))
            .wrap(RejectInbound);
        let err = channel.transmit(&COMMAND, None).unwrap_err();
        assert!(matches!(err, Error::Transform(TransformError::Inbound(_))));
    }

    #[test]
    fn test_malformed_response_through_stage() {
        let mut channel = MockTransport::with_response(Bytes::from_static(&[0x90])).wrap(Identity);
        let err = channel.transmit(&COMMAND, None).unwrap_err();
        assert!(matches!(err, Error::Response(ResponseError::Malformed(1))));
    }

    #[test]
    fn test_connection_state_passes_through() {
        let mut channel = MockTransport::echo(0x90, 0x00).wrap(TracingTransform);
        assert!(channel.is_connected());
        assert!(channel.identifier().is_some());

        channel.disconnect().unwrap();
        assert!(!channel.is_connected());
        assert!(channel.transmit(&COMMAND, None).unwrap_err().is_transport());
    }
}
