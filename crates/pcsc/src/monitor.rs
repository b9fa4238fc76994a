//! Background monitor for PC/SC card events

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use emvscan_apdu_core::CardEvent;
use parking_lot::Mutex;
use pcsc::{Context, PNP_NOTIFICATION, ReaderState, Scope, State};
use tracing::{debug, trace, warn};

use crate::error::PcscError;
use crate::event::{CardEventHandler, CardEventSender};

/// How long a single status wait blocks before the running flag is checked
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Last known card per reader, used to turn reader states into transitions
#[derive(Debug, Default)]
struct CardTracker {
    cards: HashMap<String, Option<Bytes>>,
}

impl CardTracker {
    /// Record the state of a reader and return the event it implies, if any
    ///
    /// A card that is replaced between two observations yields an insert for
    /// the new ATR. Removal is only reported for a card that was seen.
    fn observe(&mut self, reader: &str, state: State, atr: &[u8]) -> Option<CardEvent> {
        let present = state.contains(State::PRESENT) && !state.contains(State::EMPTY);
        let previous = self.cards.get(reader).cloned().flatten();

        if present {
            if previous.as_deref() == Some(atr) {
                return None;
            }
            let atr = Bytes::copy_from_slice(atr);
            self.cards.insert(reader.to_string(), Some(atr.clone()));
            Some(CardEvent::Inserted {
                reader: reader.to_string(),
                atr,
            })
        } else if state.contains(State::EMPTY) || state.contains(State::UNAVAILABLE) {
            self.cards.insert(reader.to_string(), None);
            previous.map(|_| CardEvent::Removed {
                reader: reader.to_string(),
            })
        } else {
            None
        }
    }

    /// Drop readers that disappeared, reporting removal of their cards
    fn retain(&mut self, readers: &[String]) -> Vec<CardEvent> {
        let gone: Vec<String> = self
            .cards
            .keys()
            .filter(|name| !readers.contains(*name))
            .cloned()
            .collect();

        gone.into_iter()
            .filter_map(|reader| {
                self.cards
                    .remove(&reader)
                    .flatten()
                    .map(|_| CardEvent::Removed { reader })
            })
            .collect()
    }
}

/// Current reader names, empty when the service reports none
pub(crate) fn list_readers(context: &Context) -> Result<Vec<CString>, PcscError> {
    match context.list_readers_owned() {
        Ok(readers) => Ok(readers),
        Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Bring the watched states in line with the reader list, keeping known states
pub(crate) fn refresh_states(states: &mut Vec<ReaderState>, readers: Vec<CString>) {
    states.retain(|rs| {
        rs.name() == PNP_NOTIFICATION() || readers.iter().any(|r| r.as_c_str() == rs.name())
    });
    for reader in readers {
        if !states.iter().any(|rs| rs.name() == reader.as_c_str()) {
            states.push(ReaderState::new(reader, State::UNAWARE));
        }
    }
}

/// Wait once for state changes and feed the results through the tracker
fn poll(
    context: &Context,
    states: &mut Vec<ReaderState>,
    tracker: &Mutex<CardTracker>,
    timeout: Duration,
) -> Result<Vec<CardEvent>, PcscError> {
    let readers = list_readers(context)?;
    let names: Vec<String> = readers
        .iter()
        .map(|r| r.to_string_lossy().into_owned())
        .collect();
    refresh_states(states, readers);

    let mut events = tracker.lock().retain(&names);

    for rs in states.iter_mut() {
        rs.sync_current_state();
    }

    match context.get_status_change(Some(timeout), states) {
        Ok(()) => {}
        Err(pcsc::Error::Timeout | pcsc::Error::Cancelled) => return Ok(events),
        Err(e) => return Err(e.into()),
    }

    let mut tracker = tracker.lock();
    for rs in states.iter() {
        if rs.name() == PNP_NOTIFICATION() {
            continue;
        }
        let reader = rs.name().to_string_lossy();
        trace!(%reader, state = ?rs.event_state(), "Reader state");
        events.extend(tracker.observe(&reader, rs.event_state(), rs.atr()));
    }

    Ok(events)
}

fn initial_states() -> Vec<ReaderState> {
    vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)]
}

/// Monitor for PC/SC card insertion and removal
pub struct PcscMonitor {
    /// PC/SC context, owned by this monitor so it can be cancelled
    context: Context,
    /// Whether the background thread should keep running
    running: Arc<AtomicBool>,
    /// Cards seen so far
    tracker: Arc<Mutex<CardTracker>>,
    /// States used by the synchronous wait
    states: Vec<ReaderState>,
    /// Background thread, if started
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PcscMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscMonitor")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl PcscMonitor {
    /// Create a monitor with a dedicated context
    pub fn create() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self {
            context,
            running: Arc::new(AtomicBool::new(false)),
            tracker: Arc::default(),
            states: initial_states(),
            worker: Mutex::new(None),
        })
    }

    /// Wait up to `timeout` for card events
    ///
    /// Must not be mixed with a running background monitor, which shares
    /// the record of known cards.
    pub fn wait_for_card_events(&mut self, timeout: Duration) -> Result<Vec<CardEvent>, PcscError> {
        poll(&self.context, &mut self.states, &self.tracker, timeout)
    }

    /// Start monitoring card events on a background thread
    ///
    /// Cards already present when monitoring starts are reported as inserted.
    pub fn monitor_cards<H>(&self, mut handler: H) -> Result<(), PcscError>
    where
        H: CardEventHandler + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PcscError::MonitorRunning);
        }

        let context = self.context.clone();
        let running = Arc::clone(&self.running);
        let tracker = Arc::clone(&self.tracker);

        let handle = thread::Builder::new()
            .name("pcsc-monitor".into())
            .spawn(move || {
                debug!("Card monitor started");
                let mut states = initial_states();
                while running.load(Ordering::Acquire) {
                    match poll(&context, &mut states, &tracker, POLL_INTERVAL) {
                        Ok(events) => {
                            for event in events {
                                debug!(%event, "Card event");
                                handler.handle_event(event);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Card monitor poll failed");
                            thread::sleep(POLL_INTERVAL);
                        }
                    }
                }
                debug!("Card monitor stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                PcscError::Other(e.to_string())
            })?;

        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Start monitoring card events, sending them on a channel
    ///
    /// The monitor keeps running if the receiver is dropped; call [`stop`](Self::stop).
    pub fn monitor_cards_channel(&self, sender: CardEventSender) -> Result<(), PcscError> {
        self.monitor_cards(move |event| {
            let _ = sender.send(event);
        })
    }

    /// Stop the background monitor and wait for its thread to exit
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        // Wake a blocked status wait
        if let Err(e) = self.context.cancel() {
            debug!(error = %e, "Failed to cancel status wait");
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// Whether the background monitor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for PcscMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const ATR: [u8; 4] = hex!("3B 02 14 50");

    #[test]
    fn test_insert_then_remove() {
        let mut tracker = CardTracker::default();

        let event = tracker.observe("Reader 0", State::PRESENT, &ATR);
        assert_eq!(
            event,
            Some(CardEvent::Inserted {
                reader: "Reader 0".into(),
                atr: Bytes::copy_from_slice(&ATR),
            })
        );

        // Same card again is not a new event
        assert_eq!(tracker.observe("Reader 0", State::PRESENT | State::INUSE, &ATR), None);

        let event = tracker.observe("Reader 0", State::EMPTY, &[]);
        assert_eq!(
            event,
            Some(CardEvent::Removed {
                reader: "Reader 0".into()
            })
        );
        assert_eq!(tracker.observe("Reader 0", State::EMPTY, &[]), None);
    }

    #[test]
    fn test_removal_of_unseen_card_is_silent() {
        let mut tracker = CardTracker::default();
        assert_eq!(tracker.observe("Reader 0", State::EMPTY, &[]), None);
    }

    #[test]
    fn test_swapped_card_reports_insert() {
        let mut tracker = CardTracker::default();
        tracker.observe("Reader 0", State::PRESENT, &ATR);

        let other = hex!("3B 9E 95 80 1F C3");
        let event = tracker.observe("Reader 0", State::PRESENT, &other);
        assert!(matches!(event, Some(CardEvent::Inserted { atr, .. }) if atr[..] == other));
    }

    #[test]
    fn test_unplugged_reader_reports_removal() {
        let mut tracker = CardTracker::default();
        tracker.observe("Reader 0", State::PRESENT, &ATR);
        tracker.observe("Reader 1", State::EMPTY, &[]);

        let events = tracker.retain(&["Reader 2".to_string()]);
        assert_eq!(
            events,
            vec![CardEvent::Removed {
                reader: "Reader 0".into()
            }]
        );
        assert!(tracker.cards.is_empty());
    }
}
