//! Device manager for PC/SC operations

use std::time::Instant;

use emvscan_apdu_core::CardTransport;
use pcsc::{Context, PNP_NOTIFICATION, ReaderState, Scope, State};
use tracing::{debug, instrument};

use crate::config::{CardRequest, ConnectStrategy, PcscConfig};
use crate::error::PcscError;
use crate::monitor::{PcscMonitor, list_readers, refresh_states};
use crate::reader::PcscReader;
use crate::transport::PcscTransport;
use crate::util::match_atr;

/// Manager for PC/SC device operations
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
}

impl std::fmt::Debug for PcscDeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscDeviceManager").finish_non_exhaustive()
    }
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers with the card each one holds
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = list_readers(&self.context)?;
        if readers.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut states: Vec<_> = readers
            .into_iter()
            .map(|name| ReaderState::new(name, State::UNAWARE))
            .collect();
        self.context.get_status_change(None, &mut states)?;

        Ok(states.iter().map(PcscReader::from_reader_state).collect())
    }

    /// Open a connection to a specific reader
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTransport, PcscError> {
        self.open_reader_with_config(reader_name, PcscConfig::default())
    }

    /// Open a connection to a specific reader with custom configuration
    ///
    /// The card is connected on first use, or explicitly with
    /// [`CardTransport::connect`].
    pub fn open_reader_with_config(
        &self,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        Ok(PcscTransport::new(self.context.clone(), reader_name, config))
    }

    /// Connect to a reader using the specified strategy
    pub fn connect_strategy(
        &self,
        strategy: ConnectStrategy,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        let reader = match strategy {
            ConnectStrategy::Reader(name) => return self.open_reader_with_config(&name, config),
            ConnectStrategy::AnyCard => self
                .list_readers()?
                .into_iter()
                .find(PcscReader::has_card)
                .ok_or_else(|| PcscError::NoCard("No reader with card found".to_string()))?,
            ConnectStrategy::CardWithAtr(pattern, mask) => self
                .list_readers()?
                .into_iter()
                .find(|reader| {
                    reader
                        .atr()
                        .is_some_and(|atr| match_atr(atr, &pattern, mask.as_deref()))
                })
                .ok_or_else(|| PcscError::NoCard("No card with matching ATR found".to_string()))?,
            ConnectStrategy::FirstAvailable => self
                .list_readers()?
                .into_iter()
                .next()
                .ok_or(PcscError::NoReadersAvailable)?,
        };

        self.open_reader_with_config(reader.name(), config)
    }

    /// Wait for a card that satisfies `request`
    ///
    /// Cards already present count. Returns a connected transport for the
    /// first matching card, or `None` when the timeout elapses first.
    #[instrument(skip_all, fields(timeout = ?request.timeout))]
    pub fn wait_for_card(
        &self,
        request: &CardRequest,
    ) -> Result<Option<PcscTransport>, PcscError> {
        let deadline = Instant::now() + request.timeout;
        let mut states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

        loop {
            refresh_states(&mut states, list_readers(&self.context)?);
            for rs in &mut states {
                rs.sync_current_state();
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.context.get_status_change(Some(remaining), &mut states) {
                Ok(()) => {}
                Err(pcsc::Error::Timeout) => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            for reader in states
                .iter()
                .filter(|rs| rs.name() != PNP_NOTIFICATION())
                .map(PcscReader::from_reader_state)
            {
                let Some(atr) = reader.atr() else { continue };
                if !request.card_type.matches(atr) {
                    debug!(reader = %reader, "Card does not match request");
                    continue;
                }

                let config = PcscConfig::default().with_share_mode(request.share_mode);
                let mut transport = self.open_reader_with_config(reader.name(), config)?;
                match transport.connect() {
                    Ok(()) => return Ok(Some(transport)),
                    // Pulled out between the status change and the connect
                    Err(PcscError::NoCard(_) | PcscError::CardRemoved) => continue,
                    Err(e) => return Err(e),
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    /// Create a monitor for PC/SC events
    ///
    /// The monitor has its own context so stopping it never cancels a wait
    /// issued through this manager.
    pub fn monitor(&self) -> Result<PcscMonitor, PcscError> {
        PcscMonitor::create()
    }
}
