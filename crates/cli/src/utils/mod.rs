use std::time::Duration;

use bytes::Bytes;
use emvscan_apdu_core::CardTransport;
use emvscan_transport_pcsc::{CardRequest, PcscDeviceManager, PcscTransport};
use tracing::info;

/// Parse a hex argument, ignoring whitespace and colons
pub(crate) fn parse_hex(s: &str) -> Result<Bytes, String> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(cleaned)
        .map(Bytes::from)
        .map_err(|e| format!("invalid hex: {e}"))
}

/// Parse a single byte given in hex
pub(crate) fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let s = s.trim_start_matches("0x");
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid byte: {e}"))
}

/// Connect to the named reader, or wait up to `timeout` for any card
pub(crate) fn connect_card(
    manager: &PcscDeviceManager,
    reader: Option<&str>,
    timeout: Duration,
) -> Result<Option<PcscTransport>, Box<dyn std::error::Error>> {
    let transport = match reader {
        Some(name) => {
            let mut transport = manager.open_reader(name)?;
            transport.connect()?;
            Some(transport)
        }
        None => manager.wait_for_card(&CardRequest::any().with_timeout(timeout))?,
    };

    if let Some(transport) = &transport {
        info!("Using reader: {}", transport.reader_name());
    }
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("3B 02:14 50").unwrap(), Bytes::from_static(&[0x3B, 0x02, 0x14, 0x50]));
        assert!(parse_hex("3B0").is_err());
    }

    #[test]
    fn test_parse_hex_byte() {
        assert_eq!(parse_hex_byte("A0").unwrap(), 0xA0);
        assert_eq!(parse_hex_byte("0x00").unwrap(), 0x00);
        assert!(parse_hex_byte("100").is_err());
    }
}
