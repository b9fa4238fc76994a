//! Core error type for all card operations
//!
//! Each layer has its own error enum (command, response, transport, transform).
//! This module aggregates them so that session and discovery code can bubble
//! any of them up with `?`.

use crate::atr::AtrError;
use crate::command::error::CommandError;
use crate::response::error::ResponseError;
use crate::response::status::StatusWord;
use crate::transform::error::TransformError;
use crate::transport::error::TransportError;

/// Result type for card operations
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed to connect or to exchange bytes with the card
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The card returned bytes that do not form a response
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The command could not be encoded
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A transform stage rejected the bytes passing through it
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The Answer To Reset could not be parsed
    #[error(transparent)]
    Atr(#[from] AtrError),

    /// The card answered with a status word the caller did not anticipate
    #[error("Unexpected status {status} ({}) during {operation}", status.description())]
    UnexpectedStatus {
        /// Status word returned by the card
        status: StatusWord,
        /// Operation that produced the status
        operation: &'static str,
    },

    /// GET RESPONSE chaining did not finish within the allowed number of hops
    #[error("Chain limit exceeded after {0} GET RESPONSE commands")]
    ChainLimitExceeded(usize),

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an unexpected status error
    pub const fn unexpected_status(status: StatusWord, operation: &'static str) -> Self {
        Self::UnexpectedStatus { status, operation }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error originated in the transport
    pub fn is_transport(&self) -> bool {
        matches!(self.root(), Self::Transport(_))
    }
}

/// Extension trait for Result with card Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T, Error>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T, Error> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_root() {
        let result: core::result::Result<(), TransportError> = Err(TransportError::Connection);
        let err = result.context("Failed to open session").unwrap_err();

        assert!(err.is_transport());
        assert_eq!(
            err.to_string(),
            "Failed to open session: Failed to connect to device"
        );
    }

    #[test]
    fn test_unexpected_status_message() {
        let err = Error::unexpected_status(StatusWord::new(0x6A, 0x82), "SELECT");
        assert_eq!(
            err.to_string(),
            "Unexpected status 6A 82 (File not found) during SELECT"
        );
        assert!(!err.is_transport());
    }
}
