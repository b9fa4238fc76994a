//! Background scanner driving discovery from card events
//!
//! The scanner subscribes to `insert` and `remove` on an [`EventBus`]. The
//! insert subscriber only queues a job; discovery runs on the scanner's own
//! worker thread so the thread publishing events is never blocked by card
//! I/O. The queue holds a single pending job: an insert arriving while one is
//! already waiting is dropped, unless the waiting job was cancelled by a
//! later remove, in which case the new insert takes its place. The remove subscriber cancels the pass in
//! progress, which stops before its next READ RECORD.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use emvscan_apdu_core::{
    CardEvent, CardSession, CardTransport, EventBus, Result, ResultExt, SubscriptionId,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::discovery::{CancellationToken, DiscoveryReport, discover};

/// Result of one scan job
#[derive(Debug)]
pub struct ScanOutcome {
    /// Reader the card was inserted in
    pub reader: String,
    /// Answer To Reset reported with the insert event
    pub atr: Bytes,
    /// Discovery report, or the error that aborted the pass
    pub result: Result<DiscoveryReport>,
}

#[derive(Debug)]
struct ScanJob {
    reader: String,
    atr: Bytes,
    cancel: CancellationToken,
}

/// Worker thread running discovery for inserted cards
#[derive(Debug)]
pub struct Scanner {
    bus: EventBus<CardEvent>,
    insert: SubscriptionId,
    remove: SubscriptionId,
    active: Arc<Mutex<CancellationToken>>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Scanner {
    /// Subscribe to `bus` and start the worker thread
    ///
    /// `connect` is called on the worker thread with the reader name and must
    /// return a connected transport for the card in that reader. Outcomes are
    /// delivered on the returned receiver.
    pub fn spawn<T, F>(
        bus: &EventBus<CardEvent>,
        connect: F,
        config: ScanConfig,
    ) -> (Self, Receiver<ScanOutcome>)
    where
        T: CardTransport + 'static,
        F: FnMut(&str) -> Result<T> + Send + 'static,
    {
        let (job_tx, job_rx) = bounded::<ScanJob>(1);
        let (outcome_tx, outcome_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let active = Arc::new(Mutex::new(CancellationToken::new()));

        let pending = Arc::clone(&active);
        let queued = job_rx.clone();
        let insert = bus.subscribe(CardEvent::INSERT, move |event: &CardEvent| {
            let CardEvent::Inserted { reader, atr } = event else {
                return Ok(());
            };
            let cancel = CancellationToken::new();
            let job = ScanJob {
                reader: reader.clone(),
                atr: atr.clone(),
                cancel: cancel.clone(),
            };

            let mut active = pending.lock();
            let job = match job_tx.try_send(job) {
                Ok(()) => {
                    *active = cancel;
                    return Ok(());
                }
                Err(TrySendError::Full(job)) => job,
                Err(TrySendError::Disconnected(_)) => return Err("scanner stopped".into()),
            };

            // Inserts are serialised by the `active` lock, so the slot freed
            // here stays free until this subscriber sends again
            match queued.try_recv() {
                Ok(waiting) if !waiting.cancel.is_cancelled() => {
                    warn!(reader = %job.reader, "Scan already pending, dropping insert");
                    job_tx.try_send(waiting).map_err(|_| "scanner stopped")?;
                }
                Ok(stale) => {
                    debug!(reader = %stale.reader, "Replacing cancelled pending scan");
                    job_tx.try_send(job).map_err(|_| "scanner stopped")?;
                    *active = cancel;
                }
                Err(_) => {
                    job_tx.try_send(job).map_err(|_| "scanner stopped")?;
                    *active = cancel;
                }
            }
            Ok(())
        });

        let current = Arc::clone(&active);
        let remove = bus.subscribe(CardEvent::REMOVE, move |_: &CardEvent| {
            current.lock().cancel();
            Ok(())
        });

        let worker = thread::spawn(move || {
            run_worker(job_rx, shutdown_rx, outcome_tx, connect, config);
        });

        let scanner = Self {
            bus: bus.clone(),
            insert,
            remove,
            active,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        };
        (scanner, outcome_rx)
    }

    /// Cancel the pass in progress, if any
    pub fn cancel(&self) {
        self.active.lock().cancel();
    }

    /// Unsubscribe, stop the worker and wait for it to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.bus.unsubscribe(CardEvent::INSERT, self.insert);
        self.bus.unsubscribe(CardEvent::REMOVE, self.remove);
        self.active.lock().cancel();
        // Dropping the sender wakes the worker
        self.shutdown.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Scanner worker panicked");
            }
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<T, F>(
    jobs: Receiver<ScanJob>,
    shutdown: Receiver<()>,
    outcomes: Sender<ScanOutcome>,
    mut connect: F,
    config: ScanConfig,
) where
    T: CardTransport,
    F: FnMut(&str) -> Result<T>,
{
    debug!("Scanner worker started");
    loop {
        let job = select! {
            recv(jobs) -> job => match job {
                Ok(job) => job,
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        };

        info!(reader = %job.reader, atr = %hex::encode_upper(&job.atr), "Scanning card");
        let result = scan(&mut connect, &config, &job);
        if let Err(e) = &result {
            warn!(reader = %job.reader, error = %e, "Scan failed");
        }

        let outcome = ScanOutcome {
            reader: job.reader,
            atr: job.atr,
            result,
        };
        if outcomes.send(outcome).is_err() {
            debug!("Outcome receiver dropped");
        }
    }
    debug!("Scanner worker stopped");
}

fn scan<T, F>(connect: &mut F, config: &ScanConfig, job: &ScanJob) -> Result<DiscoveryReport>
where
    T: CardTransport,
    F: FnMut(&str) -> Result<T>,
{
    if job.cancel.is_cancelled() {
        return Ok(DiscoveryReport::cancelled());
    }

    let transport = connect(&job.reader).context("Failed to connect to card")?;
    let mut session = CardSession::with_class(transport, config.cla);
    let report = discover(&mut session, &config.discovery, &job.cancel);

    if config.disconnect_after {
        if let Err(e) = session.disconnect() {
            debug!(error = ?e, "Disconnect after scan failed");
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CardEmulator, aid_record};
    use hex_literal::hex;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn inserted() -> CardEvent {
        CardEvent::Inserted {
            reader: "Reader 0".into(),
            atr: Bytes::from_static(&[0x3B, 0x02, 0x14, 0x50]),
        }
    }

    #[test]
    fn test_insert_runs_discovery() {
        let bus = EventBus::new();
        let (scanner, outcomes) = Scanner::spawn(
            &bus,
            |_: &str| Ok(CardEmulator::new(vec![aid_record(&hex!("A0000000031010"))])),
            ScanConfig::default(),
        );

        assert_eq!(inserted().publish_on(&bus), 1);
        let outcome = outcomes.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(outcome.reader, "Reader 0");

        let report = outcome.result.unwrap();
        assert_eq!(report.aids.len(), 1);
        assert_eq!(report.records_examined, 1);

        scanner.shutdown();
        assert_eq!(bus.subscriber_count(CardEvent::INSERT), 0);
        assert_eq!(bus.subscriber_count(CardEvent::REMOVE), 0);
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let bus = EventBus::new();
        let (_scanner, outcomes) = Scanner::spawn(
            &bus,
            |_: &str| -> Result<CardEmulator> {
                Err(emvscan_apdu_core::transport::TransportError::NoCard.into())
            },
            ScanConfig::default(),
        );

        inserted().publish_on(&bus);
        let outcome = outcomes.recv_timeout(TIMEOUT).unwrap();
        let err = outcome.result.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().starts_with("Failed to connect to card"));
    }
}
