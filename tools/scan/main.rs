//! Probe discovery scan tool.
//!
//! Runs one on-demand discovery against the serial backends and prints the
//! attached dongles, or stays subscribed with `--watch` and prints
//! lifecycle events as probes come and go.
//!
//! ```bash
//! cargo run --bin dongle_scan
//! cargo run --bin dongle_scan -- --json
//! cargo run --bin dongle_scan -- --watch
//! ```

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tokio_stream::StreamExt;

use dongle_hub::{DiscoveryConfig, DongleEvent, DongleHub, DriverRegistry};

#[derive(Parser)]
#[command(name = "dongle_scan")]
#[command(about = "Scan for attached Bluetooth Low Energy dongles")]
struct Cli {
    /// Print machine-readable JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Keep running and print lifecycle events as they happen
    #[arg(short, long)]
    watch: bool,

    /// Configuration file (defaults to dongle.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct ScanRow {
    instance_id: String,
    generation: String,
    port: Option<String>,
    serial_number: Option<String>,
    manufacturer: Option<String>,
    advisory: Option<String>,
}

fn print_event(event: &DongleEvent) {
    match event {
        DongleEvent::Added(adapter) => println!(
            "added    {} ({} on {})",
            adapter.instance_id(),
            adapter.generation(),
            adapter.port().unwrap_or("-")
        ),
        DongleEvent::Removed(adapter) => println!("removed  {}", adapter.instance_id()),
        DongleEvent::AdapterOpened(adapter) => println!("opened   {}", adapter.instance_id()),
        DongleEvent::AdapterClosed(adapter) => println!("closed   {}", adapter.instance_id()),
        DongleEvent::Error(err) => println!("error    {err}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DiscoveryConfig::load_from(path)?,
        None => DiscoveryConfig::load()?,
    };

    let hub = DongleHub::start(DriverRegistry::serial(), config)?;
    let mut events = hub.event_stream();

    let adapters = hub.adapters().await?;
    let mut rows: Vec<ScanRow> = adapters
        .values()
        .map(|adapter| ScanRow {
            instance_id: adapter.instance_id().to_string(),
            generation: adapter.generation().to_string(),
            port: adapter.port().map(str::to_owned),
            serial_number: adapter.serial_number().map(str::to_owned),
            manufacturer: adapter.manufacturer().map(str::to_owned),
            advisory: adapter.advisory().map(str::to_owned),
        })
        .collect();
    rows.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("No dongles attached.");
    } else {
        println!("{:<20} {:<4} {:<22} NOTES", "INSTANCE ID", "GEN", "PORT");
        for row in &rows {
            println!(
                "{:<20} {:<4} {:<22} {}",
                row.instance_id,
                row.generation,
                row.port.as_deref().unwrap_or("-"),
                row.advisory.as_deref().unwrap_or("")
            );
        }
    }

    if cli.watch {
        println!("Watching for lifecycle events (Ctrl-C to stop)...");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.next() => match event {
                    Some(Ok(event)) => print_event(&event),
                    // Dropped events only mean this printer fell behind.
                    Some(Err(_)) => continue,
                    None => break,
                },
            }
        }
    }

    hub.shutdown().await?;
    Ok(())
}
