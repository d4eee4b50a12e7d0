//! Command implementations.
//!
//! `push` and `simulate` share the transfer driver below; they differ only in
//! the link they hand to it.

pub(crate) mod decode;
pub(crate) mod push;
pub(crate) mod simulate;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use otalink::{Link, OtaTransfer, ProgressSnapshot, TransferConfig, TransferReport};
use tokio::sync::watch;

use crate::config::Settings;
use crate::{Cli, CliError, register_abort, use_fancy_output, was_interrupted};

/// How long to wait for trailing device reports after the last write.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

pub(crate) fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        Err(CliError::Cancelled("operation cancelled".to_string()).into())
    } else {
        Ok(())
    }
}

/// Runtime for the async transfer engine.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

/// Read a firmware image, rejecting empty files.
pub(crate) fn load_firmware(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read firmware {}", path.display()))?;
    if data.is_empty() {
        return Err(CliError::Usage(format!("firmware {} is empty", path.display())).into());
    }
    Ok(data)
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn render(pb: &ProgressBar, snap: &ProgressSnapshot) {
    pb.set_position(snap.percent.round() as u64);
    if let Some(status) = &snap.status.message_status {
        pb.set_message(status.clone());
    }
}

/// Feed the progress bar from the engine's progress observer.
fn spawn_renderer(
    pb: ProgressBar,
    mut progress: watch::Receiver<ProgressSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snap = progress.borrow_and_update().clone();
            render(&pb, &snap);
        }
    })
}

/// Run a full transfer over `link`, resuming up to `resume_attempts` times.
pub(crate) async fn drive_transfer<L: Link + ?Sized>(
    cli: &Cli,
    settings: &Settings,
    firmware: &[u8],
    link: &mut L,
    resume_attempts: u32,
) -> Result<(TransferReport, ProgressSnapshot)> {
    ensure_not_interrupted()?;

    let config = TransferConfig::default().with_write_timeout(settings.write_timeout);
    let mut transfer = OtaTransfer::new(config);
    let _registration = register_abort(transfer.abort_handle());

    let pb = progress_bar(cli.quiet);
    let renderer = spawn_renderer(pb.clone(), transfer.subscribe());

    let mut result = transfer
        .start(firmware, settings.chunk_size, &mut *link)
        .await;
    let mut resumes = 0;
    while let Err(otalink::Error::ChunkWriteFailed { offset, source }) = &result {
        if resumes >= resume_attempts {
            break;
        }
        resumes += 1;
        warn!("Chunk at offset {offset} failed ({source}), resuming ({resumes}/{resume_attempts})");
        result = transfer.resume(firmware, &mut *link).await;
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            renderer.abort();
            pb.abandon();
            return Err(e.into());
        },
    };

    // Give the device a moment to report the final position.
    let mut progress = transfer.subscribe();
    let expected = report.bytes_sent;
    let _ = tokio::time::timeout(
        SETTLE_TIMEOUT,
        progress.wait_for(|s| s.status.used_bytes >= Some(expected)),
    )
    .await;

    let snapshot = transfer.progress();
    render(&pb, &snapshot);
    renderer.abort();
    pb.finish_with_message(
        snapshot
            .status
            .message_status
            .clone()
            .unwrap_or_else(|| "complete".to_string()),
    );

    info!(
        "Sent {} bytes in {} chunks ({:.2?})",
        report.bytes_sent, report.chunks_sent, report.elapsed
    );
    Ok((report, snapshot))
}

/// Print the outcome of a completed transfer.
pub(crate) fn print_summary(quiet: bool, report: &TransferReport, snapshot: &ProgressSnapshot) {
    if quiet {
        return;
    }
    eprintln!(
        "\n{} Transferred {} bytes in {} chunks ({:.2?})",
        style("✓").green().bold(),
        report.bytes_sent,
        report.chunks_sent,
        report.elapsed
    );
    if let Some(status) = &snapshot.status.message_status {
        eprintln!("  {} device status: {status}", style("•").dim());
    }
    if let Some(percent) = snapshot.percent_or_none() {
        eprintln!("  {} device progress: {percent:.1}%", style("•").dim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_firmware_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let err = load_firmware(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_load_firmware_missing() {
        let err = load_firmware(Path::new("/nonexistent/fw.bin")).unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_none());
    }
}
