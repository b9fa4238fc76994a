//! AID discovery from the payment system directory
//!
//! Records are read one by one from the configured short file until the card
//! answers with anything other than `90 00`. That terminating status (usually
//! `6A 83`, record not found) ends the pass and is not an error. Each record
//! that carries an application template contributes its AID to the report.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emvscan_apdu_core::{CardSession, CardTransport, Result, StatusWord};
use tracing::{debug, info, instrument};

use crate::aid::{AidSet, ApplicationIdentifier};
use crate::config::DiscoveryConfig;

/// Directory record template tag
pub const RECORD_TEMPLATE: u8 = 0x70;
/// Application template tag
pub const APPLICATION_TEMPLATE: u8 = 0x61;
/// Shortest record that can carry an AID
pub const MIN_RECORD_LEN: usize = 11;
/// Offset of the AID length byte
const AID_LENGTH_OFFSET: usize = 5;

/// Shared flag used to stop a discovery pass between records
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// AIDs in the order they were found
    pub aids: AidSet,
    /// Records read successfully
    pub records_examined: usize,
    /// Status word that ended the pass, if the card ended it
    pub terminator: Option<StatusWord>,
    /// Whether the pass was stopped by a cancellation
    pub cancelled: bool,
}

impl DiscoveryReport {
    /// Report for a pass cancelled before it read anything
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}

/// Extract the AID from a directory record
///
/// Returns `None` for records that do not follow the
/// `70 .. 61 .. 4F <n> <aid>` layout, whose length byte runs past the
/// record, or whose AID length is outside 5-16 bytes.
pub fn extract_aid(record: &[u8]) -> Option<ApplicationIdentifier> {
    if record.len() < MIN_RECORD_LEN
        || record[0] != RECORD_TEMPLATE
        || record[2] != APPLICATION_TEMPLATE
    {
        return None;
    }
    let start = AID_LENGTH_OFFSET + 1;
    let len = usize::from(record[AID_LENGTH_OFFSET]);
    let bytes = record.get(start..start + len)?;
    ApplicationIdentifier::try_from(bytes).ok()
}

/// Read the directory records and collect the AIDs they list
///
/// `cancel` is checked before every READ RECORD. Transport errors abort the
/// pass and are returned as-is.
#[instrument(level = "debug", skip_all, fields(sfi = config.sfi))]
pub fn discover<T: CardTransport>(
    session: &mut CardSession<T>,
    config: &DiscoveryConfig,
    cancel: &CancellationToken,
) -> Result<DiscoveryReport> {
    let mut report = DiscoveryReport::default();

    for index in 1..=config.max_records {
        if cancel.is_cancelled() {
            debug!(index, "Discovery cancelled");
            report.cancelled = true;
            break;
        }

        let response = session.read_record(index, config.sfi)?;
        if !response.is_success() {
            debug!(index, status = %response.status(), "End of records");
            report.terminator = Some(response.status());
            break;
        }
        report.records_examined += 1;

        match extract_aid(response.data()) {
            Some(aid) => {
                if report.aids.insert(aid.clone()) {
                    info!(%aid, label = %aid.classify(), "AID found");
                }
            }
            None => debug!(index, "Record carries no AID"),
        }
    }

    Ok(report)
}
