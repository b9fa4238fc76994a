//! Error types specific to APDU commands

/// Error for APDU command encoding and parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Serialized command is shorter than a header or its Lc disagrees with its length
    #[error("Invalid command length: {0}")]
    InvalidLength(usize),

    /// Data field does not fit in a short Lc byte
    #[error("Data too long: {0} bytes (max {1})")]
    DataTooLong(usize, usize),
}

impl CommandError {
    /// Create a data too long error
    pub const fn data_too_long(actual: usize, max: usize) -> Self {
        Self::DataTooLong(actual, max)
    }
}
