//! Application Identifiers

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use derive_more::{AsRef, Deref};

use crate::brand::{self, Classification};

/// Length of the Registered Application Provider Identifier
pub const RID_LEN: usize = 5;
/// Shortest valid AID
pub const MIN_AID_LEN: usize = RID_LEN;
/// Longest valid AID
pub const MAX_AID_LEN: usize = 16;

/// Errors building an [`ApplicationIdentifier`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AidError {
    /// AIDs are 5 to 16 bytes long
    #[error("Invalid AID length {0}, expected {MIN_AID_LEN}-{MAX_AID_LEN} bytes")]
    InvalidLength(usize),

    /// Input was not valid hex
    #[error("Invalid AID hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Application Identifier (RID followed by an optional PIX)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, AsRef, Deref)]
#[as_ref(forward)]
pub struct ApplicationIdentifier(Bytes);

impl ApplicationIdentifier {
    /// Validate and wrap raw AID bytes
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self, AidError> {
        let bytes = bytes.into();
        if !(MIN_AID_LEN..=MAX_AID_LEN).contains(&bytes.len()) {
            return Err(AidError::InvalidLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Parse an AID from hex, ignoring spaces
    pub fn from_hex(s: &str) -> Result<Self, AidError> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        Self::new(hex::decode(compact)?)
    }

    /// Registered Application Provider Identifier
    pub fn rid(&self) -> &[u8] {
        &self.0[..RID_LEN]
    }

    /// Proprietary Application Identifier Extension, possibly empty
    pub fn pix(&self) -> &[u8] {
        &self.0[RID_LEN..]
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Scheme and product this AID belongs to
    pub fn classify(&self) -> Classification {
        brand::classify(&self.0)
    }
}

impl fmt::Display for ApplicationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

impl fmt::Debug for ApplicationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApplicationIdentifier({self})")
    }
}

impl FromStr for ApplicationIdentifier {
    type Err = AidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<&[u8]> for ApplicationIdentifier {
    type Error = AidError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::new(Bytes::copy_from_slice(bytes))
    }
}

/// Insertion-ordered set of AIDs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AidSet(Vec<ApplicationIdentifier>);

impl AidSet {
    /// Create an empty set
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add `aid` unless already present; returns whether it was added
    pub fn insert(&mut self, aid: ApplicationIdentifier) -> bool {
        if self.0.contains(&aid) {
            return false;
        }
        self.0.push(aid);
        true
    }

    /// Whether `aid` is in the set
    pub fn contains(&self, aid: &ApplicationIdentifier) -> bool {
        self.0.contains(aid)
    }

    /// Number of AIDs
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in discovery order
    pub fn iter(&self) -> std::slice::Iter<'_, ApplicationIdentifier> {
        self.0.iter()
    }

    /// AIDs in discovery order
    pub fn as_slice(&self) -> &[ApplicationIdentifier] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a AidSet {
    type Item = &'a ApplicationIdentifier;
    type IntoIter = std::slice::Iter<'a, ApplicationIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for AidSet {
    type Item = ApplicationIdentifier;
    type IntoIter = std::vec::IntoIter<ApplicationIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<ApplicationIdentifier> for AidSet {
    fn from_iter<I: IntoIterator<Item = ApplicationIdentifier>>(iter: I) -> Self {
        let mut set = Self::new();
        for aid in iter {
            set.insert(aid);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_length_bounds() {
        assert!(ApplicationIdentifier::new(Bytes::copy_from_slice(&hex!("A000000003"))).is_ok());
        assert_eq!(
            ApplicationIdentifier::new(Bytes::copy_from_slice(&hex!("A0000000"))),
            Err(AidError::InvalidLength(4))
        );
        assert_eq!(
            ApplicationIdentifier::try_from(&[0u8; 17][..]),
            Err(AidError::InvalidLength(17))
        );
    }

    #[test]
    fn test_rid_pix_and_display() {
        let aid: ApplicationIdentifier = "A0 00 00 00 03 10 10".parse().unwrap();
        assert_eq!(aid.rid(), &hex!("A000000003"));
        assert_eq!(aid.pix(), &hex!("1010"));
        assert_eq!(aid.to_string(), "A0000000031010");
        assert_eq!(aid.len(), 7);
        assert!(matches!("zz".parse::<ApplicationIdentifier>(), Err(AidError::InvalidHex(_))));
    }

    #[test]
    fn test_set_deduplicates() {
        let visa = ApplicationIdentifier::from_hex("A0000000031010").unwrap();
        let maestro = ApplicationIdentifier::from_hex("A0000000043060").unwrap();

        let mut set = AidSet::new();
        assert!(set.insert(visa.clone()));
        assert!(set.insert(maestro.clone()));
        assert!(!set.insert(visa.clone()));

        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice(), &[visa, maestro]);
    }
}
