//! Composite-image merging.
//!
//! Places the four build artifacts at their flash offsets and invokes the
//! external merge tool to produce one flashable binary per environment.
//! Flash parameters depend on the environment's chip family: ESP32-C3
//! class boards boot from offset `0x0` at 80 MHz flash clock; every other
//! family uses the classic `0x1000` bootloader base at 40 MHz.

use crate::environment::Environment;
use crate::pipeline::build::ArtifactSet;
use crate::tools::{Invocation, ToolError, ToolRunner};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

/// External merge tool executable.
pub const MERGE_TOOL: &str = "esptool.py";

/// File name of the merged composite image.
pub const MERGED_IMAGE: &str = "firmware-merged.bin";

/// Partition-table flash offset, identical across families.
pub const PARTITION_TABLE_OFFSET: u32 = 0x8000;

/// Application flash offset, identical across families.
pub const APPLICATION_OFFSET: u32 = 0x10000;

/// Chip-family-specific flash parameters for the merge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashProfile {
    /// Chip identifier passed to `--chip`.
    pub chip: &'static str,
    pub flash_mode: &'static str,
    pub flash_freq: &'static str,
    pub flash_size: &'static str,
    /// Flash offset of the second-stage bootloader.
    pub bootloader_offset: u32,
}

/// Profile for ESP32-C3 class boards.
pub const ESP32_C3_PROFILE: FlashProfile = FlashProfile {
    chip: "esp32c3",
    flash_mode: "dio",
    flash_freq: "80m",
    flash_size: "4MB",
    bootloader_offset: 0x0,
};

/// Profile for every other board family.
pub const DEFAULT_PROFILE: FlashProfile = FlashProfile {
    chip: "esp32",
    flash_mode: "dio",
    flash_freq: "40m",
    flash_size: "4MB",
    bootloader_offset: 0x1000,
};

/// Selects the flash profile for a resolved board family.
pub fn profile_for(board_family: &str) -> &'static FlashProfile {
    if board_family.eq_ignore_ascii_case("ESP32-C3") {
        &ESP32_C3_PROFILE
    } else {
        &DEFAULT_PROFILE
    }
}

/// Merge-step failures. Fatal for the entire run.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The merge tool exited non-zero
    #[error("{MERGE_TOOL} failed for environment {environment} (exit status {status})")]
    ToolFailed { environment: String, status: String },

    /// The merge tool could not be launched
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Merges the artifact set into one composite image in `output_dir`.
///
/// Returns the path of the merged binary. Relative offsets are baked into
/// the image, so the result flashes as a single part at offset zero.
pub fn merge(
    runner: &dyn ToolRunner,
    environment: &Environment,
    artifacts: &ArtifactSet,
    filesystem_offset: u32,
    output_dir: &Path,
) -> Result<PathBuf, MergeError> {
    let profile = profile_for(&environment.board_family);
    let merged = output_dir.join(MERGED_IMAGE);

    let invocation = Invocation::new(MERGE_TOOL)
        .args(["--chip", profile.chip])
        .args(["merge_bin", "-o"])
        .arg(merged.display().to_string())
        .args(["--flash_mode", profile.flash_mode])
        .args(["--flash_freq", profile.flash_freq])
        .args(["--flash_size", profile.flash_size])
        .arg(format!("{:#x}", profile.bootloader_offset))
        .arg(artifacts.bootloader.display().to_string())
        .arg(format!("{:#x}", PARTITION_TABLE_OFFSET))
        .arg(artifacts.partition_table.display().to_string())
        .arg(format!("{:#x}", APPLICATION_OFFSET))
        .arg(artifacts.application.display().to_string())
        .arg(format!("{:#x}", filesystem_offset))
        .arg(artifacts.filesystem.display().to_string());

    debug!(
        environment = environment.name.as_str(),
        chip = profile.chip,
        command = invocation.command_line(),
        "merging artifacts"
    );

    let output = runner.run(&invocation)?;
    if !output.success() {
        error!(
            environment = environment.name.as_str(),
            status = output.status_text(),
            stderr = output.stderr.trim(),
            "merge tool failed"
        );
        return Err(MergeError::ToolFailed {
            environment: environment.name.clone(),
            status: output.status_text(),
        });
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutput;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct FakeRunner {
        calls: RefCell<Vec<Invocation>>,
        exit_status: i32,
    }

    impl FakeRunner {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                exit_status: 0,
            }
        }
    }

    impl ToolRunner for FakeRunner {
        fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok(ToolOutput {
                status: Some(self.exit_status),
                ..Default::default()
            })
        }
    }

    fn environment(family: &str) -> Environment {
        Environment {
            name: "reader".to_string(),
            version: "1.0-1".to_string(),
            friendly_name: None,
            board_family: family.to_string(),
            build_flags: String::new(),
        }
    }

    fn artifacts() -> ArtifactSet {
        ArtifactSet {
            bootloader: PathBuf::from("b/bootloader.bin"),
            partition_table: PathBuf::from("b/partitions.bin"),
            application: PathBuf::from("b/firmware.bin"),
            filesystem: PathBuf::from("b/littlefs.bin"),
        }
    }

    #[test]
    fn test_profile_selection() {
        assert_eq!(profile_for("ESP32-C3"), &ESP32_C3_PROFILE);
        assert_eq!(profile_for("esp32-c3"), &ESP32_C3_PROFILE);
        assert_eq!(profile_for("ESP32"), &DEFAULT_PROFILE);
        assert_eq!(profile_for("ESP32-S3"), &DEFAULT_PROFILE);
        assert_eq!(profile_for("anything-else"), &DEFAULT_PROFILE);
    }

    #[test]
    fn test_profiles_never_share_bootloader_offset() {
        assert_ne!(
            ESP32_C3_PROFILE.bootloader_offset,
            DEFAULT_PROFILE.bootloader_offset
        );
    }

    #[test]
    fn test_merge_default_profile_invocation() {
        let runner = FakeRunner::new();
        let out = PathBuf::from("/tmp/out");

        let merged = merge(&runner, &environment("ESP32"), &artifacts(), 0x290000, &out).unwrap();
        assert!(merged.ends_with(MERGED_IMAGE));

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        let args = &calls[0].args;
        assert_eq!(calls[0].program, MERGE_TOOL);
        assert_eq!(&args[0..2], &["--chip", "esp32"]);
        assert!(args.contains(&"--flash_freq".to_string()));
        assert!(args.contains(&"40m".to_string()));
        assert!(args.contains(&"0x1000".to_string()));
        assert!(args.contains(&"0x8000".to_string()));
        assert!(args.contains(&"0x10000".to_string()));
        assert!(args.contains(&"0x290000".to_string()));
    }

    #[test]
    fn test_merge_c3_profile_invocation() {
        let runner = FakeRunner::new();
        let out = PathBuf::from("/tmp/out");

        merge(&runner, &environment("ESP32-C3"), &artifacts(), 0x290000, &out).unwrap();

        let calls = runner.calls.borrow();
        let args = &calls[0].args;
        assert_eq!(&args[0..2], &["--chip", "esp32c3"]);
        assert!(args.contains(&"80m".to_string()));
        assert!(args.contains(&"0x0".to_string()));
        assert!(!args.contains(&"0x1000".to_string()));
    }

    #[test]
    fn test_offset_file_pairs_are_ordered() {
        let runner = FakeRunner::new();
        let out = PathBuf::from("/tmp/out");

        merge(&runner, &environment("ESP32"), &artifacts(), 0x290000, &out).unwrap();

        let calls = runner.calls.borrow();
        let args = &calls[0].args;
        let boot_idx = args.iter().position(|a| a == "0x1000").unwrap();
        assert!(args[boot_idx + 1].ends_with("bootloader.bin"));
        let fs_idx = args.iter().position(|a| a == "0x290000").unwrap();
        assert!(args[fs_idx + 1].ends_with("littlefs.bin"));
    }

    #[test]
    fn test_nonzero_exit_is_fatal() {
        let mut runner = FakeRunner::new();
        runner.exit_status = 2;
        let out = PathBuf::from("/tmp/out");

        let err = merge(&runner, &environment("ESP32"), &artifacts(), 0x290000, &out).unwrap_err();
        assert!(matches!(err, MergeError::ToolFailed { .. }));
    }
}
