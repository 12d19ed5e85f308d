//! rf - command-line client for the ReclaimFocus daemon
//!
//! # Usage
//!
//! ```text
//! rf status example.com       # Timer for one domain
//! rf timers                   # Every live timer
//! rf cleanup example.com      # Drop a domain's timer and cooldown
//! rf logs -n 20               # Newest block log entries
//! rf clear-logs               # Empty the block log
//! rf clear-badge              # Reset the badge, keep the log
//! rf schedule https://calm.com 25m --tab 12
//! rf scheduled                # Pending scheduled redirects
//! rf unschedule 3             # Cancel one
//! rf watch                    # Stream expiries, blocks and redirects
//! ```

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rf_cli::client::{ClientConfig, DaemonClient};
use rf_cli::format;
use rf_core::{ScheduleId, TabId};

// ============================================================================
// CLI Arguments
// ============================================================================

/// rf - inspect and steer the ReclaimFocus daemon
#[derive(Parser, Debug)]
#[command(name = "rf")]
#[command(about = "Inspect timers, block logs and scheduled redirects")]
#[command(version)]
struct Args {
    /// Daemon socket (default: $RF_SOCKET or /tmp/reclaim-focus.sock)
    #[arg(long, global = true)]
    socket: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the timer for a domain, host or URL
    Status { domain: String },
    /// List every live timer
    Timers,
    /// Discard a domain's timer, tracked tabs and cooldown
    Cleanup { domain: String },
    /// Show the block log, newest first
    Logs {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Empty the block log and reset the badge
    ClearLogs,
    /// Reset the badge without touching the log
    ClearBadge,
    /// Redirect a tab after a delay (e.g. 90s, 25m, 1h)
    Schedule {
        target: String,
        delay: String,
        /// Tab to redirect; defaults to whichever tab is focused when it fires
        #[arg(long)]
        tab: Option<u32>,
    },
    /// Cancel a scheduled redirect
    Unschedule { id: u64 },
    /// List pending scheduled redirects
    Scheduled,
    /// Stream daemon broadcasts until interrupted
    Watch,
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses `90`, `90s`, `25m` or `1h`. A bare number is seconds.
fn parse_delay(input: &str) -> Result<Duration> {
    let input = input.trim();
    let (digits, unit) = match input.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => input.split_at(split),
        None => (input, "s"),
    };

    let value: u64 = digits
        .parse()
        .with_context(|| format!("Invalid delay: {input:?}"))?;
    let secs = match unit {
        "s" => value,
        "m" => value.saturating_mul(60),
        "h" => value.saturating_mul(3600),
        other => bail!("Unknown delay unit {other:?} (use s, m or h)"),
    };
    Ok(Duration::from_secs(secs))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = ClientConfig::from_env();
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }

    let mut client = DaemonClient::connect(&config).await?;
    debug!(client_id = client.client_id(), "Connected");

    match args.command {
        Command::Status { domain } => match client.timer_status(&domain).await? {
            Some(status) => println!("{}", format::timer_line(&status)),
            None => println!("No timer for {domain}"),
        },

        Command::Timers => {
            let timers = client.list_timers().await?;
            if timers.is_empty() {
                println!("No active timers");
            }
            for status in &timers {
                println!("{}", format::timer_line(status));
            }
        }

        Command::Cleanup { domain } => {
            let domain = client.force_cleanup(&domain).await?;
            println!("Cleaned up {domain}");
        }

        Command::Logs { limit } => {
            let (entries, total) = client.get_logs(limit).await?;
            for entry in &entries {
                println!("{}", format::log_line(entry));
            }
            if entries.len() < total {
                println!("({} of {total} entries)", entries.len());
            } else if total == 0 {
                println!("Block log is empty");
            }
        }

        Command::ClearLogs => {
            client.clear_logs().await?;
            println!("Block log cleared");
        }

        Command::ClearBadge => {
            client.clear_badge().await?;
            println!("Badge cleared");
        }

        Command::Schedule { target, delay, tab } => {
            let delay = parse_delay(&delay)?;
            let redirect = client
                .schedule_redirect(tab.map(TabId::new), &target, delay)
                .await?;
            println!("Scheduled {}", format::scheduled_line(&redirect));
        }

        Command::Unschedule { id } => {
            if client.cancel_scheduled(ScheduleId(id)).await? {
                println!("Cancelled #{id}");
            } else {
                println!("No pending redirect #{id}");
            }
        }

        Command::Scheduled => {
            let redirects = client.list_scheduled().await?;
            if redirects.is_empty() {
                println!("No scheduled redirects");
            }
            for redirect in &redirects {
                println!("{}", format::scheduled_line(redirect));
            }
        }

        Command::Watch => return watch(client).await,
    }

    client.disconnect().await?;
    Ok(())
}

async fn watch(mut client: DaemonClient) -> Result<()> {
    let timers = client.subscribe().await?;
    for status in &timers {
        println!("timer     {}", format::timer_line(status));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            message = client.next_message() => {
                if let Some(line) = format::broadcast_line(&message?) {
                    println!("{line}");
                }
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}
