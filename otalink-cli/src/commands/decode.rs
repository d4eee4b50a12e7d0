//! Decode-status command implementation.

use anyhow::{Context, Result};
use console::style;
use otalink::protocol::status::field;
use otalink::{DeviceStatus, decode_status};

/// Decode one status record and print it.
pub(crate) fn cmd_decode_status(text: &str, json: bool, quiet: bool) -> Result<()> {
    let status = decode_status(text.as_bytes()).context("invalid status record")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if !quiet {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &DeviceStatus) {
    eprintln!("{}", style("Device status").bold().underlined());
    if status.is_empty() {
        eprintln!("  {}", style("(no known fields)").dim());
        return;
    }
    let rows: [(&str, Option<String>); 5] = [
        (field::OTA_SIZE, status.ota_size.map(|v| v.to_string())),
        (field::MSG_STATUS, status.message_status.clone()),
        (field::SEGMENT, status.segment.map(|v| v.to_string())),
        (field::TOTAL_BYTE, status.total_bytes.map(|v| v.to_string())),
        (field::USE_BYTE, status.used_bytes.map(|v| v.to_string())),
    ];
    for (name, value) in rows {
        if let Some(value) = value {
            eprintln!("  {} {name:<11} {value}", style("•").dim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_status_ok() {
        assert!(cmd_decode_status(r#"{"Segment":3}"#, false, true).is_ok());
    }

    #[test]
    fn test_decode_status_malformed() {
        let err = cmd_decode_status(r#"{"Segment":"#, false, true).unwrap_err();
        assert!(err.downcast_ref::<otalink::DecodeError>().is_some());
    }
}
