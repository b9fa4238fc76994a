use std::time::Duration;

use emvscan_apdu_core::{Atr, CardSession};
use emvscan_transport_pcsc::PcscDeviceManager;

use crate::utils::connect_card;

/// Class byte of GSM 11.11 SIM commands
const SIM_CLA: u8 = 0xA0;
/// DF_TELECOM file identifier
const DF_TELECOM: [u8; 2] = [0x7F, 0x10];
/// GET RESPONSE hops allowed after the SELECT
const MAX_CHAIN: usize = 8;

/// Parse and print the ATR of the card
pub(crate) fn atr_command(
    manager: &PcscDeviceManager,
    reader: Option<&str>,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(transport) = connect_card(manager, reader, timeout)? else {
        println!("No reader/card connected");
        return Ok(());
    };
    let session = CardSession::new(transport);
    let raw = session.identifier().ok_or("Card did not report an ATR")?;
    let atr = Atr::parse(&raw)?;

    println!("ATR: {atr}");
    println!("historical bytes: {}", hex::encode_upper(atr.historical_bytes()));
    match atr.checksum() {
        Some(tck) => println!("checksum: 0x{tck:02X}"),
        None => println!("checksum: none"),
    }
    println!("checksum OK: {}", atr.checksum_ok());
    println!("T0  supported: {}", atr.supports_t0());
    println!("T1  supported: {}", atr.supports_t1());
    println!("T15 supported: {}", atr.supports_t15());

    Ok(())
}

/// Select DF_TELECOM and fetch the pending response bytes
pub(crate) fn select_file_command(
    manager: &PcscDeviceManager,
    reader: Option<&str>,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(transport) = connect_card(manager, reader, timeout)? else {
        println!("No reader/card connected");
        return Ok(());
    };
    let mut session = CardSession::with_class(transport, SIM_CLA);
    if let Some(atr) = session.identifier() {
        println!("ATR: {}", hex::encode_upper(atr));
    }

    let response = session.select(&DF_TELECOM)?;
    if response.continuation_length().is_none() {
        println!("no DF_TELECOM ({})", response.status());
        return Ok(());
    }

    let response = session.fetch_remaining(response, MAX_CHAIN)?;
    println!("DF_TELECOM: {}", hex::encode_upper(response.data()));
    println!("status: {}", response.status());

    Ok(())
}
