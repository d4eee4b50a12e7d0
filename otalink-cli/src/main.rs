//! otalink CLI - Command-line tool for pushing firmware over OTA links.
//!
//! ## Features
//!
//! - Push a firmware image through a serial bridge
//! - Rehearse a transfer against a simulated device
//! - Decode device status records
//! - Caller-driven resume after a failed chunk write
//! - Environment variable and config file support

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use log::{debug, warn};
use otalink::AbortHandle;

mod commands;
mod config;

use config::{Config, Overrides, Settings};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Abort handle of the transfer currently running, if any.
static ACTIVE_TRANSFER: Mutex<Option<AbortHandle>> = Mutex::new(None);

/// Check if animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether Ctrl-C was pressed.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Route Ctrl-C to `handle` until the returned guard is dropped.
pub(crate) fn register_abort(handle: AbortHandle) -> AbortRegistration {
    *ACTIVE_TRANSFER
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    AbortRegistration
}

pub(crate) struct AbortRegistration;

impl Drop for AbortRegistration {
    fn drop(&mut self) {
        ACTIVE_TRANSFER
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

fn on_interrupt() {
    INTERRUPTED.store(true, Ordering::Relaxed);
    let active = ACTIVE_TRANSFER
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(handle) = active.as_ref() {
        handle.abort();
    }
}

/// Errors classified by the CLI for exit codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Invalid invocation or input.
    #[error("{0}")]
    Usage(String),
    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(String),
    /// Stopped by the user.
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) => 3,
            Self::Cancelled(_) => 130,
        }
    }
}

/// Map an error to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }
    if let Some(lib_err) = err.downcast_ref::<otalink::Error>() {
        return match lib_err {
            otalink::Error::InvalidConfig(_) => 3,
            otalink::Error::Aborted { .. } => 130,
            otalink::Error::HandshakeFailed(_)
            | otalink::Error::ChunkWriteFailed { .. }
            | otalink::Error::Link(_) => 4,
            otalink::Error::InvalidState { .. } | otalink::Error::Decode(_) => 1,
        };
    }
    if err.downcast_ref::<otalink::LinkError>().is_some() {
        return 4;
    }
    1
}

/// otalink - Push firmware images to devices in fixed-size chunks.
///
/// Environment variables:
///   OTALINK_PORT              - Serial bridge port
///   OTALINK_BAUD              - Serial bridge baud rate (default: 115200)
///   OTALINK_CHUNK_SIZE        - Bytes per chunk write (default: 512)
///   OTALINK_WRITE_TIMEOUT_MS  - Per-write timeout, 0 disables (default: 10000)
#[derive(Parser)]
#[command(name = "otalink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial bridge port (e.g., /dev/ttyUSB0, COM3).
    #[arg(short, long, global = true, env = "OTALINK_PORT")]
    port: Option<String>,

    /// Baud rate of the serial bridge.
    #[arg(short, long, global = true, env = "OTALINK_BAUD")]
    baud: Option<u32>,

    /// Bytes per chunk write.
    #[arg(long, global = true, env = "OTALINK_CHUNK_SIZE")]
    chunk_size: Option<u32>,

    /// Per-write timeout in milliseconds (0 disables).
    #[arg(long, global = true, env = "OTALINK_WRITE_TIMEOUT_MS")]
    write_timeout_ms: Option<u64>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port.clone(),
            baud: self.baud,
            chunk_size: self.chunk_size,
            write_timeout_ms: self.write_timeout_ms,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Push a firmware image through a serial bridge.
    Push {
        /// Path to the firmware image.
        firmware: PathBuf,

        /// Resume up to N times after a failed chunk write.
        #[arg(long, default_value = "0", value_name = "N")]
        resume_attempts: u32,
    },

    /// Rehearse a transfer against a simulated device.
    Simulate {
        /// Path to the firmware image.
        firmware: PathBuf,

        /// Reject the write with this index once (0 is the size announcement).
        #[arg(long, value_name = "N")]
        fail_at_write: Option<usize>,

        /// Delay of every simulated write, in milliseconds.
        #[arg(long, default_value = "0", value_name = "MS")]
        write_delay_ms: u64,

        /// Resume up to N times after a failed chunk write.
        #[arg(long, default_value = "0", value_name = "N")]
        resume_attempts: u32,
    },

    /// Decode a device status record.
    DecodeStatus {
        /// Raw status text, e.g. '{"Segment":3,"Use_byte":1536}'.
        text: String,

        /// Output the decoded status as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if std::env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "otalink v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(e) = ctrlc::set_handler(on_interrupt) {
        warn!("Could not install Ctrl-C handler: {e}");
    }

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            exit_code_for(&err)
        },
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(),
    };
    let settings = Settings::resolve(&cli.overrides(), &config);
    debug!("Effective settings: {settings:?}");

    match &cli.command {
        Commands::Push {
            firmware,
            resume_attempts,
        } => commands::push::cmd_push(cli, &settings, firmware, *resume_attempts),
        Commands::Simulate {
            firmware,
            fail_at_write,
            write_delay_ms,
            resume_attempts,
        } => commands::simulate::cmd_simulate(
            cli,
            &settings,
            firmware,
            &commands::simulate::SimulateOptions {
                fail_at_write: *fail_at_write,
                write_delay_ms: *write_delay_ms,
                resume_attempts: *resume_attempts,
            },
        ),
        Commands::DecodeStatus { text, json } => {
            commands::decode::cmd_decode_status(text, *json, cli.quiet)
        },
    }
}
