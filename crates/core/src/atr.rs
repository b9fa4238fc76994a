//! Answer To Reset parsing (ISO/IEC 7816-3)

use std::fmt;

use bytes::Bytes;

/// Errors raised while parsing an ATR
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AtrError {
    /// Fewer than the two mandatory bytes (TS, T0)
    #[error("ATR too short: {0} bytes")]
    TooShort(usize),

    /// TS is neither direct (3B) nor inverse (3F) convention
    #[error("Invalid initial character {0:#04x}")]
    InvalidTs(u8),

    /// The format bytes announce more bytes than present
    #[error("Truncated ATR: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Length implied by the format bytes
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Bytes left over after the check byte
    #[error("{0} unexpected trailing bytes after ATR")]
    TrailingBytes(usize),
}

/// Interface bytes of one level (TAi, TBi, TCi, TDi)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceBytes {
    /// TAi
    pub ta: Option<u8>,
    /// TBi
    pub tb: Option<u8>,
    /// TCi
    pub tc: Option<u8>,
    /// TDi
    pub td: Option<u8>,
}

/// Parsed Answer To Reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atr {
    raw: Bytes,
    interface: Vec<InterfaceBytes>,
    historical_start: usize,
    historical_len: usize,
    tck: Option<u8>,
    protocols: Vec<u8>,
}

impl Atr {
    /// Parse raw ATR bytes
    pub fn parse(raw: &[u8]) -> Result<Self, AtrError> {
        if raw.len() < 2 {
            return Err(AtrError::TooShort(raw.len()));
        }
        let ts = raw[0];
        if ts != 0x3B && ts != 0x3F {
            return Err(AtrError::InvalidTs(ts));
        }

        let t0 = raw[1];
        let historical_len = usize::from(t0 & 0x0F);
        let mut indicator = t0 >> 4;
        let mut pos = 2;
        let mut interface = Vec::new();
        let mut protocols = Vec::new();

        let next = |pos: &mut usize| -> Result<u8, AtrError> {
            let byte = raw.get(*pos).copied().ok_or(AtrError::Truncated {
                expected: *pos + 1,
                actual: raw.len(),
            })?;
            *pos += 1;
            Ok(byte)
        };

        loop {
            let mut level = InterfaceBytes::default();
            if indicator & 0x1 != 0 {
                level.ta = Some(next(&mut pos)?);
            }
            if indicator & 0x2 != 0 {
                level.tb = Some(next(&mut pos)?);
            }
            if indicator & 0x4 != 0 {
                level.tc = Some(next(&mut pos)?);
            }
            if indicator & 0x8 != 0 {
                let td = next(&mut pos)?;
                level.td = Some(td);
                if !protocols.contains(&(td & 0x0F)) {
                    protocols.push(td & 0x0F);
                }
                indicator = td >> 4;
                interface.push(level);
            } else {
                interface.push(level);
                break;
            }
        }

        // No TD1 means T=0 only
        if protocols.is_empty() {
            protocols.push(0);
        }

        let historical_start = pos;
        let needs_tck = protocols.iter().any(|&p| p != 0);
        let expected = historical_start + historical_len + usize::from(needs_tck);
        if raw.len() < expected {
            return Err(AtrError::Truncated {
                expected,
                actual: raw.len(),
            });
        }
        if raw.len() > expected {
            return Err(AtrError::TrailingBytes(raw.len() - expected));
        }

        Ok(Self {
            raw: Bytes::copy_from_slice(raw),
            interface,
            historical_start,
            historical_len,
            tck: needs_tck.then(|| raw[expected - 1]),
            protocols,
        })
    }

    /// Raw ATR bytes
    pub const fn as_bytes(&self) -> &Bytes {
        &self.raw
    }

    /// Interface bytes, one entry per level
    pub fn interface_bytes(&self) -> &[InterfaceBytes] {
        &self.interface
    }

    /// Historical bytes (card issuer data)
    pub fn historical_bytes(&self) -> &[u8] {
        &self.raw[self.historical_start..self.historical_start + self.historical_len]
    }

    /// Check byte, present whenever a protocol other than T=0 is offered
    pub const fn checksum(&self) -> Option<u8> {
        self.tck
    }

    /// Whether the XOR of T0 through TCK is zero
    ///
    /// An ATR without a check byte is considered valid.
    pub fn checksum_ok(&self) -> bool {
        self.tck.is_none() || self.raw[1..].iter().fold(0, |acc, b| acc ^ b) == 0
    }

    /// Protocols offered by the card, in the order announced
    pub fn protocols(&self) -> &[u8] {
        &self.protocols
    }

    /// Card offers T=0
    pub fn supports_t0(&self) -> bool {
        self.protocols.contains(&0)
    }

    /// Card offers T=1
    pub fn supports_t1(&self) -> bool {
        self.protocols.contains(&1)
    }

    /// Card announces global interface bytes (T=15)
    pub fn supports_t15(&self) -> bool {
        self.protocols.contains(&15)
    }
}

impl TryFrom<&[u8]> for Atr {
    type Error = AtrError;

    fn try_from(raw: &[u8]) -> Result<Self, AtrError> {
        Self::parse(raw)
    }
}

impl fmt::Display for Atr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.raw.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
