//! Error types for transform stages

/// Error raised by a transform stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// The outbound transform could not protect the command
    #[error("Outbound transform failed: {0}")]
    Outbound(&'static str),

    /// The inbound transform could not unprotect the response data
    #[error("Inbound transform failed: {0}")]
    Inbound(&'static str),
}
