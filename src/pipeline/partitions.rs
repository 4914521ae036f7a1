//! Filesystem partition-offset discovery.
//!
//! Runs the external partition-table dump tool against the generated
//! partition-table binary and scans its text output for the filesystem
//! partition's flash offset. Discovery is best-effort: any failure along
//! the way degrades to a documented default offset and never fails the
//! build.

use crate::tools::{Invocation, ToolRunner};
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// External partition-table dump tool.
pub const PARTITION_TOOL: &str = "gen_esp32part.py";

/// Offset assumed when discovery fails.
pub const DEFAULT_FILESYSTEM_OFFSET: u32 = 0x29_0000;

/// Partition names that identify the filesystem partition in dump output.
/// The upstream partition subtype is `spiffs` for both SPIFFS and LittleFS
/// images, so both spellings are accepted.
const FILESYSTEM_PARTITION_NAMES: [&str; 2] = ["spiffs", "littlefs"];

/// Finds the flash offset of the filesystem partition.
///
/// Invokes the dump tool and scans each output line, case-insensitively,
/// for a filesystem partition name; the first hexadecimal token on the
/// matching line is the offset. Falls back to
/// [`DEFAULT_FILESYSTEM_OFFSET`] with a warning when the tool cannot be
/// run, exits non-zero, or prints no matching line.
pub fn find_filesystem_offset(runner: &dyn ToolRunner, partition_table: &Path) -> u32 {
    match try_find(runner, partition_table) {
        Some(offset) => {
            debug!(offset = format!("{offset:#x}"), "filesystem partition offset discovered");
            offset
        }
        None => {
            warn!(
                partition_table = %partition_table.display(),
                default = format!("{DEFAULT_FILESYSTEM_OFFSET:#x}"),
                "could not determine filesystem partition offset; using default"
            );
            DEFAULT_FILESYSTEM_OFFSET
        }
    }
}

fn try_find(runner: &dyn ToolRunner, partition_table: &Path) -> Option<u32> {
    let invocation = Invocation::new(PARTITION_TOOL).arg(partition_table.display().to_string());
    let output = match runner.run(&invocation) {
        Ok(output) => output,
        Err(err) => {
            warn!(error = %err, "partition dump tool could not be launched");
            return None;
        }
    };
    if !output.success() {
        warn!(
            status = output.status_text(),
            "partition dump tool exited non-zero"
        );
        return None;
    }

    parse_dump(&output.stdout)
}

/// Extracts the filesystem offset from partition-dump text.
fn parse_dump(dump: &str) -> Option<u32> {
    let hex_token = Regex::new(r"0x[0-9a-fA-F]+").ok()?;

    for line in dump.lines() {
        let lower = line.to_lowercase();
        if !FILESYSTEM_PARTITION_NAMES
            .iter()
            .any(|name| lower.contains(name))
        {
            continue;
        }
        let token = hex_token.find(line)?.as_str();
        return u32::from_str_radix(token.trim_start_matches("0x"), 16).ok();
    }
    None
}
