use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{after, never, select};
use emvscan_apdu_core::CardTransport;
use emvscan_transport_pcsc::{
    CardRequest, PcscDeviceManager, PcscError, PcscMonitor, card_event_channel,
};

/// List all available readers
pub(crate) fn list_command(manager: &PcscDeviceManager) -> Result<(), Box<dyn std::error::Error>> {
    let readers = match manager.list_readers() {
        Ok(readers) => readers,
        Err(PcscError::NoReadersAvailable) => {
            println!("No reader found");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        println!("{}. {reader}", i + 1);
    }

    Ok(())
}

/// Print card events until `duration` elapses or the monitor stops
pub(crate) fn monitor_command(duration: Option<Duration>) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = PcscMonitor::create()?;
    let (tx, events) = card_event_channel();
    monitor.monitor_cards_channel(tx)?;

    println!("Scanning for cards");
    let deadline = duration.map_or_else(never, after);
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => println!("{event}"),
                Err(_) => break,
            },
            recv(deadline) -> _ => break,
        }
    }

    monitor.stop();
    Ok(())
}

/// Wait for a card matching an optional ATR pattern
pub(crate) fn request_command(
    manager: &PcscDeviceManager,
    atr: Option<Bytes>,
    mask: Option<Bytes>,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = match &atr {
        Some(pattern) => CardRequest::atr(pattern, mask.as_deref()),
        None => CardRequest::any(),
    }
    .with_timeout(timeout);

    match manager.wait_for_card(&request)? {
        Some(transport) => {
            println!("Card detected successfully");
            if let Some(atr) = transport.identifier() {
                println!("{}", hex::encode_upper(atr));
            }
        }
        None if atr.is_some() => println!("Wrong card type"),
        None => println!("No reader/card connected"),
    }

    Ok(())
}
