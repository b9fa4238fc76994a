//! PC/SC transport for the EMV scanner
//!
//! This crate implements the `CardTransport` trait from `emvscan-apdu-core`
//! on top of the system PC/SC service, and adds reader enumeration, waiting
//! for a card with a timeout and a background card monitor.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::time::Duration;
//!
//! use emvscan_apdu_core::CardSession;
//! use emvscan_transport_pcsc::{CardRequest, PcscDeviceManager};
//!
//! let manager = PcscDeviceManager::new()?;
//! for reader in manager.list_readers()? {
//!     println!("{reader}");
//! }
//!
//! let request = CardRequest::any().with_timeout(Duration::from_secs(5));
//! let Some(transport) = manager.wait_for_card(&request)? else {
//!     println!("No card inserted");
//!     return Ok(());
//! };
//!
//! let mut session = CardSession::new(transport);
//! let response = session.read_record(1, 1)?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
pub mod event;
mod manager;
mod monitor;
mod reader;
mod transport;
mod util;

pub use config::{CardRequest, CardType, ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use event::{CardEventHandler, CardEventReceiver, CardEventSender, card_event_channel};
pub use manager::PcscDeviceManager;
pub use monitor::PcscMonitor;
pub use reader::PcscReader;
pub use transport::PcscTransport;
pub use util::match_atr;

// Re-export some pcsc types for convenience
pub use pcsc::Protocols;
