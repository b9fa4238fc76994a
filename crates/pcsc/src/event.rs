//! Card event delivery for the PC/SC monitor
//!
//! The monitor reports [`CardEvent`]s either to a [`CardEventHandler`] or
//! through a crossbeam channel.

use crossbeam_channel::{Receiver, Sender, unbounded};
pub use emvscan_apdu_core::CardEvent;

/// Trait for handling card events
pub trait CardEventHandler {
    /// Handle a card event
    fn handle_event(&mut self, event: CardEvent);
}

impl<F> CardEventHandler for F
where
    F: FnMut(CardEvent),
{
    fn handle_event(&mut self, event: CardEvent) {
        self(event)
    }
}

/// Sending half of a card event channel
pub type CardEventSender = Sender<CardEvent>;

/// Receiving half of a card event channel
pub type CardEventReceiver = Receiver<CardEvent>;

/// Create an unbounded card event channel
pub fn card_event_channel() -> (CardEventSender, CardEventReceiver) {
    unbounded()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_closure_handler_forwards_to_channel() {
        let (tx, rx) = card_event_channel();
        let mut handler = move |event| {
            let _ = tx.send(event);
        };

        handler.handle_event(CardEvent::Inserted {
            reader: "Reader 0".into(),
            atr: Bytes::from_static(&[0x3B, 0x02, 0x14, 0x50]),
        });
        handler.handle_event(CardEvent::Removed {
            reader: "Reader 0".into(),
        });

        let names: Vec<_> = rx.try_iter().map(|e| e.name()).collect();
        assert_eq!(names, [CardEvent::INSERT, CardEvent::REMOVE]);
    }
}
