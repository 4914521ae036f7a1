//! Compilation and artifact verification for one environment.
//!
//! Invokes the external build tool twice per environment (application
//! compile, then filesystem image) and verifies that every expected binary
//! artifact exists afterwards. A non-zero exit or a missing artifact is
//! fatal for the entire run, not just the current environment.

use crate::environment::Environment;
use crate::tools::{Invocation, ToolError, ToolRunner};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

/// External build tool executable.
pub const BUILD_TOOL: &str = "platformio";

/// Build-output directory relative to the project root.
pub const BUILD_DIR: &str = ".pio/build";

/// Bootloader artifact file name.
pub const BOOTLOADER_BIN: &str = "bootloader.bin";

/// Partition-table artifact file name.
pub const PARTITION_TABLE_BIN: &str = "partitions.bin";

/// Application image artifact file name.
pub const APPLICATION_BIN: &str = "firmware.bin";

/// Filesystem image artifact file name.
pub const FILESYSTEM_BIN: &str = "littlefs.bin";

/// Build-step failures. Every variant aborts the whole run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The compiler or filesystem-image builder exited non-zero
    #[error("{BUILD_TOOL} failed for environment {environment} (exit status {status})")]
    ToolFailed { environment: String, status: String },

    /// Expected artifacts are absent after a reportedly successful build
    #[error("missing build artifacts: {}", format_paths(.0))]
    ArtifactsMissing(Vec<PathBuf>),

    /// The build tool could not be launched
    #[error(transparent)]
    Tool(#[from] ToolError),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The four binary outputs of a successful environment build.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub bootloader: PathBuf,
    pub partition_table: PathBuf,
    pub application: PathBuf,
    pub filesystem: PathBuf,
}

impl ArtifactSet {
    /// Artifact paths for `environment` under the conventional build dir.
    pub fn for_environment(project_dir: &Path, environment: &str) -> Self {
        let dir = project_dir.join(BUILD_DIR).join(environment);
        Self {
            bootloader: dir.join(BOOTLOADER_BIN),
            partition_table: dir.join(PARTITION_TABLE_BIN),
            application: dir.join(APPLICATION_BIN),
            filesystem: dir.join(FILESYSTEM_BIN),
        }
    }

    fn paths(&self) -> [&PathBuf; 4] {
        [
            &self.bootloader,
            &self.partition_table,
            &self.application,
            &self.filesystem,
        ]
    }
}

/// Runs the external build tool for one environment at a time.
pub struct BuildRunner<'a> {
    runner: &'a dyn ToolRunner,
    project_dir: PathBuf,
}

impl<'a> BuildRunner<'a> {
    pub fn new(runner: &'a dyn ToolRunner, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_dir: project_dir.into(),
        }
    }

    /// Compiles the application, builds the filesystem image, and verifies
    /// all artifacts exist. Returns their paths.
    pub fn build(&self, environment: &Environment) -> Result<ArtifactSet, BuildError> {
        self.invoke(environment, &["run", "-e", &environment.name])?;
        self.invoke(environment, &["run", "-t", "buildfs", "-e", &environment.name])?;
        self.verify_artifacts(environment)
    }

    fn invoke(&self, environment: &Environment, args: &[&str]) -> Result<(), BuildError> {
        let invocation = Invocation::new(BUILD_TOOL)
            .args(args.iter().copied())
            .current_dir(&self.project_dir);
        debug!(
            environment = environment.name.as_str(),
            command = invocation.command_line(),
            "invoking build tool"
        );

        let output = self.runner.run(&invocation)?;
        if !output.success() {
            error!(
                environment = environment.name.as_str(),
                status = output.status_text(),
                stderr = output.stderr.trim(),
                "build tool failed"
            );
            return Err(BuildError::ToolFailed {
                environment: environment.name.clone(),
                status: output.status_text(),
            });
        }
        Ok(())
    }

    /// Checks all four artifacts and reports every missing path, not just
    /// the first.
    fn verify_artifacts(&self, environment: &Environment) -> Result<ArtifactSet, BuildError> {
        let artifacts = ArtifactSet::for_environment(&self.project_dir, &environment.name);

        let missing: Vec<PathBuf> = artifacts
            .paths()
            .into_iter()
            .filter(|path| !path.exists())
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(artifacts)
        } else {
            Err(BuildError::ArtifactsMissing(missing))
        }
    }
}
