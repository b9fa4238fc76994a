//! Payment scheme tables and AID classification

use derive_more::Display;

use crate::aid::RID_LEN;

/// Known product of an issuer, identified by a PIX prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixEntry {
    /// Leading PIX bytes
    pub pix: &'static [u8],
    /// Product name
    pub product: &'static str,
}

/// Payment scheme registered under a RID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brand {
    /// Registered Application Provider Identifier
    pub rid: [u8; RID_LEN],
    /// Scheme or issuer name
    pub issuer: &'static str,
    /// Known products; empty when the scheme is only known by name
    pub products: &'static [PixEntry],
}

const fn pix(pix: &'static [u8], product: &'static str) -> PixEntry {
    PixEntry { pix, product }
}

const fn brand(rid: [u8; RID_LEN], issuer: &'static str, products: &'static [PixEntry]) -> Brand {
    Brand {
        rid,
        issuer,
        products,
    }
}

/// Visa products
pub const VISA_PIX: &[PixEntry] = &[
    pix(&[0x10, 0x10], "credit or debit"),
    pix(&[0x20, 0x10], "Electron"),
    pix(&[0x20, 0x20], "V Pay"),
    pix(&[0x80, 0x10], "Plus"),
];

/// MasterCard products, shared by both MasterCard RIDs
pub const MASTERCARD_PIX: &[PixEntry] = &[
    pix(&[0x10, 0x10], "credit or debit"),
    pix(&[0x99, 0x99], "paypass"),
    pix(&[0x30, 0x60], "Maestro"),
    pix(&[0x60, 0x00], "Cirrus"),
];

/// China UnionPay products (3-byte PIX)
pub const CHINA_UNIONPAY_PIX: &[PixEntry] = &[
    pix(&[0x01, 0x01, 0x01], "debit"),
    pix(&[0x01, 0x01, 0x02], "credit"),
    pix(&[0x01, 0x01, 0x03], "quasi credit"),
];

/// Registered payment schemes
pub const BRANDS: &[Brand] = &[
    brand([0xA0, 0x00, 0x00, 0x00, 0x03], "Visa", VISA_PIX),
    brand([0xA0, 0x00, 0x00, 0x00, 0x04], "MasterCard", MASTERCARD_PIX),
    brand([0xA0, 0x00, 0x00, 0x00, 0x05], "MasterCard", MASTERCARD_PIX),
    brand([0xA0, 0x00, 0x00, 0x00, 0x25], "American Express", &[]),
    brand([0xA0, 0x00, 0x00, 0x00, 0x29], "LINK ATM (UK)", &[]),
    brand([0xA0, 0x00, 0x00, 0x00, 0x42], "CB (FR)", &[]),
    brand([0xA0, 0x00, 0x00, 0x00, 0x65], "JCB (JP)", &[]),
    brand([0xA0, 0x00, 0x00, 0x01, 0x21], "Dankort (DN)", &[]),
    brand([0xA0, 0x00, 0x00, 0x01, 0x41], "CoGeBan (IT)", &[]),
    brand([0xA0, 0x00, 0x00, 0x01, 0x52], "Diners Club", &[]),
    brand([0xA0, 0x00, 0x00, 0x01, 0x54], "Banrisul (BR)", &[]),
    brand([0xA0, 0x00, 0x00, 0x02, 0x28], "SPAN2 (SA)", &[]),
    brand([0xA0, 0x00, 0x00, 0x02, 0x77], "Interac (CA)", &[]),
    brand([0xA0, 0x00, 0x00, 0x03, 0x33], "China UnionPay", CHINA_UNIONPAY_PIX),
    brand([0xA0, 0x00, 0x00, 0x03, 0x59], "ZKA (DE)", &[]),
];

impl Brand {
    /// Product whose PIX prefixes `pix`
    pub fn product(&self, pix: &[u8]) -> Option<&'static str> {
        self.products
            .iter()
            .find(|entry| pix.starts_with(entry.pix))
            .map(|entry| entry.product)
    }
}

/// Scheme registered for the first five bytes of `aid`
pub fn lookup(aid: &[u8]) -> Option<&'static Brand> {
    let rid = aid.get(..RID_LEN)?;
    BRANDS.iter().find(|brand| brand.rid == rid)
}

/// What an AID was recognized as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Classification {
    /// Known scheme and product
    #[display("{issuer} - {product}")]
    Product {
        /// Scheme name
        issuer: &'static str,
        /// Product name
        product: &'static str,
    },
    /// Known scheme, unlisted product
    #[display("{issuer}")]
    Issuer {
        /// Scheme name
        issuer: &'static str,
    },
    /// RID not registered in [`BRANDS`]
    #[display("unknown EMV AID")]
    Unknown,
}

impl Classification {
    /// Scheme name, if the RID is known
    pub const fn issuer(&self) -> Option<&'static str> {
        match self {
            Self::Product { issuer, .. } | Self::Issuer { issuer } => Some(*issuer),
            Self::Unknown => None,
        }
    }
}

/// Classify an AID by RID and PIX
pub fn classify(aid: &[u8]) -> Classification {
    let Some(brand) = lookup(aid) else {
        return Classification::Unknown;
    };
    match brand.product(&aid[RID_LEN..]) {
        Some(product) => Classification::Product {
            issuer: brand.issuer,
            product,
        },
        None => Classification::Issuer {
            issuer: brand.issuer,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_known_products() {
        assert_eq!(
            classify(&hex!("A0000000031010")).to_string(),
            "Visa - credit or debit"
        );
        assert_eq!(classify(&hex!("A0000000032010")).to_string(), "Visa - Electron");
        assert_eq!(
            classify(&hex!("A0000000043060")).to_string(),
            "MasterCard - Maestro"
        );
        assert_eq!(
            classify(&hex!("A0000000059999")).to_string(),
            "MasterCard - paypass"
        );
        assert_eq!(
            classify(&hex!("A000000333010102")).to_string(),
            "China UnionPay - credit"
        );
    }

    #[test]
    fn test_issuer_only() {
        assert_eq!(
            classify(&hex!("A00000002501")),
            Classification::Issuer {
                issuer: "American Express"
            }
        );
        // Visa RID with an unlisted PIX
        assert_eq!(classify(&hex!("A0000000039999")).to_string(), "Visa");
        // RID alone
        assert_eq!(classify(&hex!("A000000152")).to_string(), "Diners Club");
        // Two-byte prefix is not enough for UnionPay
        assert_eq!(classify(&hex!("A0000003330101")).to_string(), "China UnionPay");
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify(&hex!("A0000000991010")), Classification::Unknown);
        assert_eq!(classify(&hex!("A0000000")).to_string(), "unknown EMV AID");
        assert_eq!(classify(&hex!("DEADBEEF00")).to_string(), "unknown EMV AID");
        assert_eq!(Classification::Unknown.issuer(), None);
    }

    #[test]
    fn test_table_shape() {
        assert_eq!(BRANDS.len(), 15);
        assert_eq!(lookup(&hex!("A000000004")).map(|b| b.products), Some(MASTERCARD_PIX));
        assert_eq!(lookup(&hex!("A000000005")).map(|b| b.products), Some(MASTERCARD_PIX));
    }
}
