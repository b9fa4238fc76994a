//! `emvscan`: list readers, watch card events and scan EMV cards for payment applications

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use emvscan_transport_pcsc::PcscDeviceManager;
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::*;

#[derive(Parser)]
#[command(version, about = "Scan smart card readers for EMV payment applications")]
struct Cli {
    /// Reader to use (waits for any card if not specified)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Trace level output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Print card insert and remove events
    Monitor {
        /// Stop after this many seconds (runs until interrupted if not specified)
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// List the payment applications of every card inserted
    Scan(ScanArgs),

    /// Wait for a card, optionally one whose ATR matches a pattern
    Request {
        /// ATR prefix in hex
        #[arg(long, value_parser = utils::parse_hex)]
        atr: Option<bytes::Bytes>,

        /// Mask applied to the ATR and the pattern, in hex
        #[arg(long, requires = "atr", value_parser = utils::parse_hex)]
        mask: Option<bytes::Bytes>,

        /// Seconds to wait for the card
        #[arg(long, default_value_t = 1)]
        timeout: u64,
    },

    /// Parse and print the ATR of the card
    Atr {
        /// Seconds to wait for the card
        #[arg(long, default_value_t = 1)]
        timeout: u64,
    },

    /// Select DF_TELECOM on a SIM card and fetch the response
    SelectFile {
        /// Seconds to wait for the card
        #[arg(long, default_value_t = 1)]
        timeout: u64,
    },
}

/// Options for the `scan` command
#[derive(Args)]
struct ScanArgs {
    /// Short file identifier of the payment directory
    #[arg(long, default_value_t = emvscan_emv::config::DEFAULT_SFI)]
    sfi: u8,

    /// Maximum number of records read per card
    #[arg(long, default_value_t = u8::MAX)]
    max_records: u8,

    /// Class byte in hex
    #[arg(long, default_value = "00", value_parser = utils::parse_hex_byte)]
    cla: u8,

    /// Run every exchange through a logging transform stage
    #[arg(long)]
    secure: bool,

    /// Exit after the first card has been scanned
    #[arg(long)]
    once: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let manager = PcscDeviceManager::new()?;
    let reader = cli.reader.as_deref();

    match cli.command {
        Commands::List => list_command(&manager)?,
        Commands::Monitor { seconds } => monitor_command(seconds.map(Duration::from_secs))?,
        Commands::Scan(args) => scan_command(manager, &args)?,
        Commands::Request { atr, mask, timeout } => {
            request_command(&manager, atr, mask, Duration::from_secs(timeout))?
        }
        Commands::Atr { timeout } => atr_command(&manager, reader, Duration::from_secs(timeout))?,
        Commands::SelectFile { timeout } => {
            select_file_command(&manager, reader, Duration::from_secs(timeout))?
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();
}
