//! Tests against the system PC/SC service
//!
//! These pass trivially on machines without a PC/SC daemon or reader.

use std::time::Duration;

use emvscan_apdu_core::CardTransport;
use emvscan_transport_pcsc::{CardRequest, PcscDeviceManager, PcscError};

fn manager() -> Option<PcscDeviceManager> {
    PcscDeviceManager::new().ok()
}

#[test]
fn list_readers_reports_names() {
    let Some(manager) = manager() else { return };

    match manager.list_readers() {
        Ok(readers) => {
            for reader in readers {
                assert!(!reader.name().is_empty());
                assert_eq!(reader.has_card(), reader.atr().is_some());
            }
        }
        Err(PcscError::NoReadersAvailable) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn wait_for_card_honours_timeout() {
    let Some(manager) = manager() else { return };

    // No card can match this ATR
    let request = CardRequest::atr(&[0x00, 0x00], None).with_timeout(Duration::from_millis(200));
    match manager.wait_for_card(&request) {
        Ok(transport) => assert!(transport.is_none()),
        Err(PcscError::Pcsc(_)) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn unknown_reader_is_not_connected() {
    let Some(manager) = manager() else { return };

    let mut transport = manager
        .open_reader("No Such Reader 00 00")
        .expect("transport is created lazily");
    assert!(!transport.is_connected());
    assert!(transport.identifier().is_none());
    assert!(transport.connect().is_err());
}
