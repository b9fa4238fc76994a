//! Configuration options for PC/SC transport

use std::time::Duration;

use bytes::Bytes;
use pcsc::{Protocols as PcscProtocols, ShareMode as PcscShareMode};

use crate::util::match_atr;

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card (default)
    Shared,
    /// Direct connection to the reader
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// Strategy for connecting to a card/reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// Connect to a specific reader by name
    Reader(String),

    /// Connect to any reader with a card
    AnyCard,

    /// Connect to reader with a card matching this ATR pattern
    CardWithAtr(Bytes, Option<Bytes>), // (ATR, mask)

    /// Connect to the first available reader
    FirstAvailable,
}

/// Configuration options for PC/SC transport
#[derive(Debug, Clone)]
pub struct PcscConfig {
    /// Sharing mode for card connections
    pub share_mode: ShareMode,

    /// Preferred protocols for card communication
    pub protocols: PcscProtocols,

    /// Reconnect and retry once if the card was reset under us
    pub auto_reconnect: bool,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            protocols: PcscProtocols::ANY,
            auto_reconnect: true,
        }
    }
}

impl PcscConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: PcscProtocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set whether to automatically reconnect
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }
}

/// Kind of card a [`CardRequest`] waits for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardType {
    /// Any card
    Any,
    /// Card whose ATR matches `pattern` on the bits set in `mask`
    Atr {
        /// Expected ATR prefix
        pattern: Bytes,
        /// Bits to compare; all bits when absent
        mask: Option<Bytes>,
    },
}

impl CardType {
    /// Whether a card with this ATR is acceptable
    pub fn matches(&self, atr: &[u8]) -> bool {
        match self {
            Self::Any => true,
            Self::Atr { pattern, mask } => match_atr(atr, pattern, mask.as_deref()),
        }
    }
}

/// Default time to wait for a card
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Request to wait for a card to be present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRequest {
    /// Which card to accept
    pub card_type: CardType,
    /// How long to wait
    pub timeout: Duration,
    /// Connection settings for the returned transport
    pub share_mode: ShareMode,
}

impl CardRequest {
    /// Request any card
    pub const fn any() -> Self {
        Self {
            card_type: CardType::Any,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            share_mode: ShareMode::Shared,
        }
    }

    /// Request a card whose ATR matches `pattern`
    pub fn atr(pattern: &[u8], mask: Option<&[u8]>) -> Self {
        Self {
            card_type: CardType::Atr {
                pattern: Bytes::copy_from_slice(pattern),
                mask: mask.map(Bytes::copy_from_slice),
            },
            ..Self::any()
        }
    }

    /// Set the timeout
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }
}

impl Default for CardRequest {
    fn default() -> Self {
        Self::any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_card_type_matching() {
        let atr = hex!("3B 9E 95 80 1F C3 80 31 A0 73 BE 21 13 67 29 02 01 01 81 CD B9");

        assert!(CardType::Any.matches(&atr));
        assert!(CardRequest::atr(&hex!("3B 9E 95"), None).card_type.matches(&atr));
        assert!(!CardRequest::atr(&hex!("3B 02 14 50"), None).card_type.matches(&atr));

        // Ignore TA1 (clock rate and baud divisor)
        let request = CardRequest::atr(&hex!("3B 9E 00 80"), Some(&hex!("FF FF 00 FF")));
        assert!(request.card_type.matches(&atr));
    }

    #[test]
    fn test_request_defaults() {
        let request = CardRequest::default();
        assert_eq!(request.card_type, CardType::Any);
        assert_eq!(request.timeout, Duration::from_secs(1));

        let request = request
            .with_timeout(Duration::from_millis(250))
            .with_share_mode(ShareMode::Exclusive);
        assert_eq!(request.timeout, Duration::from_millis(250));
        assert_eq!(request.share_mode, ShareMode::Exclusive);
    }

    #[test]
    fn test_config_builder() {
        let config = PcscConfig::new()
            .with_share_mode(ShareMode::Exclusive)
            .with_protocols(PcscProtocols::T0)
            .with_auto_reconnect(false);
        assert_eq!(config.share_mode, ShareMode::Exclusive);
        assert_eq!(config.protocols, PcscProtocols::T0);
        assert!(!config.auto_reconnect);
    }
}
