//! PC/SC transport implementation

use std::ffi::CString;
use std::fmt;

use bytes::Bytes;
use emvscan_apdu_core::{CardTransport, Protocol};
use pcsc::{Attribute, Card, Context, Disposition, Protocols};
use tracing::{debug, warn};

use crate::{config::PcscConfig, error::PcscError};

/// Transport implementation using PC/SC
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
    /// Protocols the current connection was negotiated with
    protocols: Protocols,
    /// Answer To Reset captured on connect
    atr: Option<Bytes>,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("protocols", &self.protocols)
            .field("config", &self.config)
            .finish()
    }
}

const fn protocols_for(protocol: Protocol) -> Protocols {
    match protocol {
        Protocol::T0 => Protocols::T0,
        Protocol::T1 => Protocols::T1,
        Protocol::Raw => Protocols::RAW,
    }
}

impl PcscTransport {
    /// Create a transport for the specified reader without connecting
    pub(crate) fn new(context: Context, reader_name: &str, config: PcscConfig) -> Self {
        Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            protocols: config.protocols,
            config,
            atr: None,
        }
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Try to connect to the card
    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader = CString::new(self.reader_name.as_str())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))?;

        let card = match self
            .context
            .connect(&reader, self.config.share_mode.into(), self.protocols)
        {
            Ok(card) => card,
            Err(pcsc::Error::NoSmartcard) => {
                return Err(PcscError::NoCard(self.reader_name.clone()));
            }
            Err(pcsc::Error::UnknownReader) => {
                return Err(PcscError::ReaderNotFound(self.reader_name.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let atr = card.get_attribute_owned(Attribute::AtrString)?;
        debug!(reader = %self.reader_name, atr = %hex::encode_upper(&atr), "Connected to card");

        self.atr = Some(Bytes::from(atr));
        self.card = Some(card);
        Ok(())
    }

    /// Renegotiate the connection if a different protocol is requested
    fn ensure_protocol(&mut self, protocol: Option<Protocol>) -> Result<(), PcscError> {
        let Some(protocols) = protocol.map(protocols_for) else {
            return Ok(());
        };
        if protocols == self.protocols {
            return Ok(());
        }

        debug!(?protocols, "Reconnecting with requested protocol");
        if let Some(card) = self.card.as_mut() {
            card.reconnect(self.config.share_mode.into(), protocols, Disposition::LeaveCard)?;
        }
        self.protocols = protocols;
        Ok(())
    }

    /// Transmit a command to the card
    fn transmit_command(&mut self, command: &[u8], retry: bool) -> Result<Bytes, PcscError> {
        self.connect_card()?;

        let card = self
            .card
            .as_mut()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;

        let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        match card.transmit(command, &mut buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(e @ (pcsc::Error::ResetCard | pcsc::Error::RemovedCard)) => {
                // The handle is stale either way
                self.card = None;
                self.atr = None;

                if e == pcsc::Error::ResetCard && self.config.auto_reconnect && retry {
                    warn!(reader = %self.reader_name, "Card was reset, reconnecting");
                    return self.transmit_command(command, false);
                }

                Err(if e == pcsc::Error::ResetCard {
                    PcscError::CardReset
                } else {
                    PcscError::CardRemoved
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl CardTransport for PcscTransport {
    type Error = PcscError;

    fn connect(&mut self) -> Result<(), Self::Error> {
        self.connect_card()
    }

    fn do_transmit_raw(
        &mut self,
        command: &[u8],
        protocol: Option<Protocol>,
    ) -> Result<Bytes, Self::Error> {
        self.ensure_protocol(protocol)?;
        self.transmit_command(command, true)
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.atr = None;
        match self.card.take() {
            Some(card) => card
                .disconnect(Disposition::LeaveCard)
                .map_err(|(_, e)| e.into()),
            None => Ok(()),
        }
    }

    fn identifier(&self) -> Option<Bytes> {
        self.atr.clone()
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
