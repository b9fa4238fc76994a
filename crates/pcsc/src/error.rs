//! Error types for PC/SC transport

use emvscan_apdu_core::transport::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),

    /// Card was reset
    #[error("Card was reset")]
    CardReset,

    /// Card was removed
    #[error("Card was removed")]
    CardRemoved,

    /// The monitor is already running
    #[error("Monitor already running")]
    MonitorRunning,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::NoCard(_) => Self::NoCard,
            PcscError::Pcsc(pcsc::Error::NoSmartcard) => Self::NoCard,
            PcscError::CardReset | PcscError::CardRemoved => Self::CardRemoved,
            PcscError::Pcsc(pcsc::Error::ResetCard | pcsc::Error::RemovedCard) => {
                Self::CardRemoved
            }
            PcscError::Pcsc(pcsc::Error::Timeout) => Self::Timeout,
            PcscError::NoReadersAvailable | PcscError::ReaderNotFound(_) => Self::Connection,
            PcscError::Pcsc(e) => Self::other(e.to_string()),
            other => Self::other(other.to_string()),
        }
    }
}

impl From<PcscError> for emvscan_apdu_core::Error {
    fn from(error: PcscError) -> Self {
        Self::Transport(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_mapping() {
        assert_eq!(
            TransportError::from(PcscError::NoCard("Reader 0".into())),
            TransportError::NoCard
        );
        assert_eq!(
            TransportError::from(PcscError::Pcsc(pcsc::Error::RemovedCard)),
            TransportError::CardRemoved
        );
        assert_eq!(
            TransportError::from(PcscError::Pcsc(pcsc::Error::Timeout)),
            TransportError::Timeout
        );
        assert_eq!(
            TransportError::from(PcscError::NoReadersAvailable),
            TransportError::Connection
        );
    }

    #[test]
    fn test_core_error_is_transport() {
        let err = emvscan_apdu_core::Error::from(PcscError::CardReset);
        assert!(err.is_transport());
    }
}
