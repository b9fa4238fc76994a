//! Reader representation for PC/SC devices

use std::fmt;

use bytes::Bytes;
use pcsc::{ReaderState, State};

/// Representation of a PC/SC card reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcscReader {
    /// Name of the reader
    name: String,

    /// Answer To Reset of the card (if present)
    atr: Option<Bytes>,
}

impl PcscReader {
    /// Create a new reader
    pub const fn new(name: String, atr: Option<Bytes>) -> Self {
        Self { name, atr }
    }

    /// Create a reader from a reader state
    pub(crate) fn from_reader_state(reader_state: &ReaderState) -> Self {
        let state = reader_state.event_state();
        let has_card = state.contains(State::PRESENT) && !state.contains(State::EMPTY);

        Self {
            name: reader_state.name().to_string_lossy().into_owned(),
            atr: has_card.then(|| Bytes::copy_from_slice(reader_state.atr())),
        }
    }

    /// Get the reader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a card is present in the reader
    pub const fn has_card(&self) -> bool {
        self.atr.is_some()
    }

    /// Get the ATR of the card if present
    pub fn atr(&self) -> Option<&[u8]> {
        self.atr.as_deref()
    }
}

impl fmt::Display for PcscReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.atr {
            Some(atr) => write!(f, "{} [card: {}]", self.name, hex::encode_upper(atr)),
            None => write!(f, "{} [empty]", self.name),
        }
    }
}
