//! Console front end for the access monitor.
//!
//! Connects to the lock controller, prints a status line for every decoded
//! event and a summary of the session on Ctrl-C. `--json` switches the output
//! to one JSON object per event for piping into other tools.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use access_monitor_lib::access::{AccessEvent, CurrentStatus, History};
use access_monitor_lib::config::MonitorConfig;
use access_monitor_lib::serial::SerialInterface;

#[derive(Parser, Debug)]
#[command(name = "access-monitor", version, about = "Watch a PIN-lock controller over serial and log access events")]
struct Cli {
    /// TOML file with connection settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port (e.g. COM9 or /dev/ttyUSB0)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Milliseconds between polls
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Emit events as JSON lines
    #[arg(long)]
    json: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load(path)
                .with_context(|| format!("load {}", path.display()))?,
            None => MonitorConfig::default(),
        };
        if let Some(port) = &self.port {
            config.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(poll_ms) = self.poll_ms {
            config.poll_interval_ms = poll_ms;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list_ports {
        for port in SerialInterface::available_ports().context("enumerate serial ports")? {
            println!("{}\t{}", port.port_name, port.description.unwrap_or_default());
        }
        return Ok(());
    }

    let config = cli.resolve_config()?;
    let handle = access_monitor_lib::start_session(&config)
        .await
        .context("connect to lock controller")?;

    let mut reader = handle.reader();
    let mut shown = reader.history();
    if !cli.json {
        println!("Waiting for data...");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            alive = reader.changed() => {
                let current = reader.history();
                // Oldest first so the console reads top to bottom
                let mut fresh: Vec<&AccessEvent> = current.since(&shown).collect();
                fresh.reverse();
                for event in fresh {
                    print_event(event, cli.json)?;
                }
                shown = current;
                if !alive {
                    log::warn!("Monitoring task ended");
                    break;
                }
            }
        }
    }

    let history = handle.stop().await.context("stop monitoring")?;
    if !cli.json {
        print_summary(&history);
    }
    Ok(())
}

fn print_event(event: &AccessEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!(
            "{}  {:<8} {:<22} {}",
            event.timestamp().format("%Y-%m-%d %H:%M:%S"),
            event.severity().label(),
            event.description(),
            event.kind().banner()
        );
    }
    Ok(())
}

fn print_summary(history: &History) {
    println!();
    match history.current_status() {
        CurrentStatus::NoData => println!("No access events received"),
        CurrentStatus::Latest { kind, timestamp } => println!(
            "Last status: {} ({})",
            kind.banner(),
            timestamp.format("%Y-%m-%d %H:%M:%S")
        ),
    }
    println!("Access history ({} events):", history.len());
    for event in history {
        println!(
            "  {}  {:<8} {}",
            event.timestamp().format("%Y-%m-%d %H:%M:%S"),
            event.severity().label(),
            event.description()
        );
    }
}
