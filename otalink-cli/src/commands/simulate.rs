//! Simulate command: the full transfer pipeline against an in-memory device.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use console::style;
use log::debug;
use otalink::MemoryLink;

use super::{drive_transfer, load_firmware, print_summary, runtime};
use crate::Cli;
use crate::config::Settings;

/// Fault injection and pacing for the simulated link.
#[derive(Debug, Clone, Default)]
pub(crate) struct SimulateOptions {
    pub fail_at_write: Option<usize>,
    pub write_delay_ms: u64,
    pub resume_attempts: u32,
}

fn build_link(options: &SimulateOptions) -> MemoryLink {
    let mut link = MemoryLink::new().with_device();
    if options.write_delay_ms > 0 {
        link = link.with_delay(Duration::from_millis(options.write_delay_ms));
    }
    if let Some(index) = options.fail_at_write {
        link = link.fail_at(index);
    }
    link
}

/// Simulate command implementation.
pub(crate) fn cmd_simulate(
    cli: &Cli,
    settings: &Settings,
    firmware: &Path,
    options: &SimulateOptions,
) -> Result<()> {
    let data = load_firmware(firmware)?;

    if !cli.quiet {
        eprintln!(
            "{} Simulating {} ({} bytes, {}-byte chunks)",
            style("🧪").cyan(),
            firmware.display(),
            data.len(),
            settings.chunk_size
        );
    }

    let mut link = build_link(options);
    let rt = runtime()?;
    let (report, snapshot) = rt.block_on(drive_transfer(
        cli,
        settings,
        &data,
        &mut link,
        options.resume_attempts,
    ))?;

    if let Some(device) = link.device() {
        debug!(
            "Simulated device received {} of {:?} bytes in {} writes",
            device.received, device.expected, device.segments
        );
    }
    print_summary(cli.quiet, &report, &snapshot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_link_defaults() {
        let link = build_link(&SimulateOptions::default());
        assert!(link.device().is_some());
        assert_eq!(link.attempts(), 0);
    }
}
