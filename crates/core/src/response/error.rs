//! Error types specific to APDU responses

/// Error for APDU response processing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// Response shorter than the two status bytes
    #[error("Malformed response: {0} bytes, expected at least 2")]
    Malformed(usize),
}
