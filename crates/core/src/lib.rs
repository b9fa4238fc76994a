//! Core traits and types for talking to smart cards over ISO/IEC 7816-4
//!
//! This crate provides the building blocks used by the EMV scanner:
//!
//! - Encoding APDU commands and decoding APDU responses
//! - Status word interpretation, including the `61 xx` / `9F xx` continuation convention
//! - Parsing the card's Answer To Reset
//! - A transport abstraction the hardware layer implements
//! - Transform stages ("secure channel") composed around a transport
//! - A card session issuing SELECT, READ RECORD and GET RESPONSE
//! - An owned event bus connecting card presence events to protocol actions
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod atr;
pub mod command;
pub mod event;
pub mod response;
pub mod session;
pub mod transform;
pub mod transport;

mod error;
pub use error::{Error, Result, ResultExt};

pub use atr::{Atr, AtrError};
pub use command::{Command, encode};
pub use event::{CardEvent, EventBus, SubscriptionId};
pub use response::status::StatusWord;
pub use response::{Response, decode};
pub use session::CardSession;
pub use transform::{Identity, SecureChannel, TracingTransform, Transform, TransportExt};
pub use transport::{CardTransport, Protocol};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CardSession, CardTransport, Command, Error, Protocol, Response, Result,
        ResultExt, StatusWord, Transform, TransportExt,
        atr::AtrError,
        command::error::CommandError,
        response::error::ResponseError,
        transform::error::TransformError,
        transport::error::TransportError,
    };
}
