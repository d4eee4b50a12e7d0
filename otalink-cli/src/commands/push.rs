//! Push command: firmware over a serial bridge.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use otalink::{SerialLink, SerialLinkConfig};

use super::{drive_transfer, ensure_not_interrupted, load_firmware, print_summary, runtime};
use crate::config::Settings;
use crate::{Cli, CliError};

/// Push command implementation.
pub(crate) fn cmd_push(
    cli: &Cli,
    settings: &Settings,
    firmware: &Path,
    resume_attempts: u32,
) -> Result<()> {
    let data = load_firmware(firmware)?;

    let port = settings.port.clone().ok_or_else(|| {
        CliError::Usage("no serial port given; use --port or set OTALINK_PORT".to_string())
    })?;

    if !cli.quiet {
        eprintln!(
            "{} {} ({} bytes, {}-byte chunks)",
            style("📦").cyan(),
            firmware.display(),
            data.len(),
            settings.chunk_size
        );
        eprintln!(
            "{} Using port {port} at {} baud",
            style("🔌").cyan(),
            settings.baud
        );
    }

    let link_config = SerialLinkConfig::new(&port, settings.baud);
    let rt = runtime()?;
    rt.block_on(async {
        let mut link = SerialLink::open(&link_config)
            .with_context(|| format!("failed to open serial port {port}"))?;
        ensure_not_interrupted()?;

        let (report, snapshot) =
            drive_transfer(cli, settings, &data, &mut link, resume_attempts).await?;
        print_summary(cli.quiet, &report, &snapshot);
        Ok::<(), anyhow::Error>(())
    })
}
