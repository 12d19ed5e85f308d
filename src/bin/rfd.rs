//! ReclaimFocus daemon - focus engine and socket server
//!
//! Runs in the background, receives tab events from the browser bridge,
//! enforces blocked sites, keywords and per-domain time budgets, and
//! answers `rf` requests.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! rfd start
//!
//! # Start the daemon (background/daemonized)
//! rfd start -d
//!
//! # Use a specific configuration file
//! rfd --config ~/rfd.toml start
//!
//! # Stop the daemon
//! rfd stop
//!
//! # Check daemon status
//! rfd status
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rfd::browser::{Browser, TabMirror};
use rfd::clock::{Clock, SystemClock};
use rfd::config::DaemonConfig;
use rfd::engine::{spawn_engine, Collaborators};
use rfd::server::DaemonServer;
use rfd::store::{FileStore, KeyValueStore};

/// ReclaimFocus daemon - tab timers, cooldowns and site blocking
#[derive(Parser, Debug)]
#[command(name = "rfd", version, about)]
struct Args {
    /// Configuration file (default: <config dir>/reclaim-focus/rfd.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("reclaim-focus")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("rfd.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("rfd.log")
}

fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        remove_pid_file();
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let pid = i32::try_from(pid).context("PID out of range")?;
        let result = unsafe { libc::kill(pid, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = DaemonConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'rfd stop' to stop it first.");
                process::exit(1);
            }

            if daemon {
                daemonize()?;
            }

            write_pid()?;

            let result = run_daemon(config);

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {pid})");
                if config.socket_path.exists() {
                    println!("Socket: {}", config.socket_path.display());
                }
                println!("Store:  {}", config.store_path.display());
                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rfd=info".parse()?)
                .add_directive("rf_core=info".parse()?)
                .add_directive("rf_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        store = %config.store_path.display(),
        "ReclaimFocus daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let mirror = Arc::new(TabMirror::new());
    let collaborators = Collaborators {
        store: Arc::new(FileStore::new(&config.store_path)) as Arc<dyn KeyValueStore>,
        browser: mirror.clone() as Arc<dyn Browser>,
        clock: Arc::new(SystemClock::new()) as Arc<dyn Clock>,
    };
    let engine = spawn_engine(collaborators, config.engine_config());
    info!("Focus engine started");

    let server = DaemonServer::new(&config.socket_path, engine.clone(), mirror, cancel_token);

    info!(socket = %config.socket_path.display(), "Starting server");

    let result = server.run().await;

    // Persist timers and cooldowns before exiting
    if let Err(e) = engine.flush().await {
        warn!(error = %e, "Final snapshot failed");
    }

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("ReclaimFocus daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
