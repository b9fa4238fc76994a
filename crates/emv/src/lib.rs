//! EMV payment application discovery
//!
//! Reads the payment system directory records of an EMV card, extracts the
//! Application Identifiers it lists and names the scheme and product behind
//! each of them. [`Scanner`] ties discovery to card insert and remove events.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod aid;
pub mod brand;
pub mod config;
pub mod discovery;
pub mod scanner;

pub use aid::{AidError, AidSet, ApplicationIdentifier};
pub use brand::{Brand, Classification, classify};
pub use config::{DiscoveryConfig, ScanConfig};
pub use discovery::{CancellationToken, DiscoveryReport, discover, extract_aid};
pub use scanner::{ScanOutcome, Scanner};

#[cfg(test)]
pub(crate) mod testing;
