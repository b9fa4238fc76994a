use crossbeam_channel::{Receiver, select};
use emvscan_apdu_core::{CardEvent, CardTransport, EventBus, TracingTransform, TransportExt};
use emvscan_emv::{DiscoveryConfig, ScanConfig, ScanOutcome, Scanner};
use emvscan_transport_pcsc::{PcscConfig, PcscDeviceManager, PcscMonitor, card_event_channel};

use crate::ScanArgs;

/// Scan every inserted card for payment applications
pub(crate) fn scan_command(
    manager: PcscDeviceManager,
    args: &ScanArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ScanConfig::default()
        .with_class(args.cla)
        .with_discovery(
            DiscoveryConfig::default()
                .with_sfi(args.sfi)
                .with_max_records(args.max_records),
        );

    let bus = EventBus::new();
    let (scanner, outcomes) = if args.secure {
        Scanner::spawn(
            &bus,
            move |reader: &str| {
                let mut transport = manager.open_reader_with_config(reader, PcscConfig::default())?;
                transport.connect()?;
                Ok(transport.wrap(TracingTransform))
            },
            config,
        )
    } else {
        Scanner::spawn(
            &bus,
            move |reader: &str| {
                let mut transport = manager.open_reader_with_config(reader, PcscConfig::default())?;
                transport.connect()?;
                Ok(transport)
            },
            config,
        )
    };

    let monitor = PcscMonitor::create()?;
    let (tx, events) = card_event_channel();
    monitor.monitor_cards_channel(tx)?;

    println!("Scanning for cards");
    run(&bus, &events, &outcomes, args.once);

    monitor.stop();
    scanner.shutdown();
    Ok(())
}

fn run(
    bus: &EventBus<CardEvent>,
    events: &Receiver<CardEvent>,
    outcomes: &Receiver<ScanOutcome>,
    once: bool,
) {
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => {
                    println!("{event}");
                    event.publish_on(bus);
                }
                Err(_) => break,
            },
            recv(outcomes) -> outcome => match outcome {
                Ok(outcome) => {
                    print_outcome(&outcome);
                    if once {
                        break;
                    }
                }
                Err(_) => break,
            },
        }
    }
}

fn print_outcome(outcome: &ScanOutcome) {
    match &outcome.result {
        Ok(report) if report.cancelled => println!("Scan of {} cancelled", outcome.reader),
        Ok(report) if report.aids.is_empty() => {
            println!("No payment application found on {}", outcome.reader);
        }
        Ok(report) => {
            for aid in &report.aids {
                println!("  {aid}  {}", aid.classify());
            }
        }
        Err(e) => println!("Scan of {} failed: {e}", outcome.reader),
    }
}
