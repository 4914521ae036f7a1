//! Sequential build pipeline.
//!
//! Environments are processed strictly one at a time, in configuration
//! order: compile, verify artifacts, discover the filesystem offset, merge
//! into a composite image, record the manifest. The index is written only
//! after the last environment succeeds; the first fatal error aborts the
//! whole run (fail-fast over partial output, since the index is consumed
//! atomically by the flashing tool).

pub mod build;
pub mod merge;
pub mod partitions;

pub use build::{ArtifactSet, BuildError, BuildRunner};
pub use merge::{profile_for, FlashProfile, MergeError};
pub use partitions::{find_filesystem_offset, DEFAULT_FILESYSTEM_OFFSET};

use crate::config::ConfigModel;
use crate::environment::{self, Environment};
use crate::manifest::ManifestBuilder;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::tools::ToolRunner;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Explicit inputs of one pipeline run; no implicit process-wide state.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Path of the build-configuration file.
    pub config_path: PathBuf,
    /// Directory the build tool runs in.
    pub project_dir: PathBuf,
    /// Output root; removed and recreated at the start of every run.
    pub output_root: PathBuf,
    /// Prefix for paths recorded in manifests and the index.
    pub asset_base: String,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub environments: usize,
    pub index_path: PathBuf,
}

/// Orchestrates the full build-matrix run.
pub struct BuildPipeline<'a> {
    runner: &'a dyn ToolRunner,
    options: PipelineOptions,
    progress: Option<&'a dyn ProgressHandler>,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(runner: &'a dyn ToolRunner, options: PipelineOptions) -> Self {
        Self {
            runner,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, handler: &'a dyn ProgressHandler) -> Self {
        self.progress = Some(handler);
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = self.progress {
            handler.on_progress(&event);
        }
    }

    /// Runs the pipeline end to end.
    ///
    /// Configuration and resolution failures surface before any external
    /// tool is invoked and before the output root is touched.
    pub fn execute(&self) -> Result<PipelineSummary> {
        let start = Instant::now();

        let model = ConfigModel::load(&self.options.config_path).with_context(|| {
            format!(
                "loading build configuration {}",
                self.options.config_path.display()
            )
        })?;
        let environments = environment::resolve_all(&model)?;
        info!(
            environments = environments.len(),
            config = %self.options.config_path.display(),
            "resolved build matrix"
        );
        self.emit(ProgressEvent::Started {
            environments: environments.len(),
        });

        self.prepare_output_root()?;

        let build_runner = BuildRunner::new(self.runner, &self.options.project_dir);
        let mut manifests =
            ManifestBuilder::new(&self.options.output_root, self.options.asset_base.clone());

        for environment in &environments {
            self.process_environment(environment, &build_runner, &mut manifests)?;
        }

        let index_path = manifests.write_index().context("writing firmware index")?;
        info!(index = %index_path.display(), "index written");

        self.emit(ProgressEvent::Completed {
            environments: environments.len(),
            total_time: start.elapsed(),
        });

        Ok(PipelineSummary {
            environments: environments.len(),
            index_path,
        })
    }

    fn process_environment(
        &self,
        environment: &Environment,
        build_runner: &BuildRunner<'_>,
        manifests: &mut ManifestBuilder,
    ) -> Result<()> {
        let env_start = Instant::now();
        self.emit(ProgressEvent::EnvironmentStarted {
            environment: environment.name.clone(),
        });
        info!(
            environment = environment.name.as_str(),
            version = environment.version.as_str(),
            board_family = environment.board_family.as_str(),
            "processing environment"
        );

        let artifacts = build_runner
            .build(environment)
            .with_context(|| format!("building environment {}", environment.name))?;

        let filesystem_offset =
            partitions::find_filesystem_offset(self.runner, &artifacts.partition_table);

        let env_dir = self.options.output_root.join(&environment.name);
        fs::create_dir_all(&env_dir)
            .with_context(|| format!("creating output directory {}", env_dir.display()))?;

        let merged = merge::merge(
            self.runner,
            environment,
            &artifacts,
            filesystem_offset,
            &env_dir,
        )
        .with_context(|| format!("merging environment {}", environment.name))?;
        debug!(merged = %merged.display(), "composite image written");

        manifests
            .record(environment)
            .with_context(|| format!("writing manifest for environment {}", environment.name))?;

        self.emit(ProgressEvent::EnvironmentComplete {
            environment: environment.name.clone(),
            duration: env_start.elapsed(),
        });
        Ok(())
    }

    /// Removes and recreates the output root so every run starts fresh.
    fn prepare_output_root(&self) -> Result<()> {
        let root = &self.options.output_root;
        if root.exists() {
            fs::remove_dir_all(root)
                .with_context(|| format!("cleaning output directory {}", root.display()))?;
        }
        fs::create_dir_all(root)
            .with_context(|| format!("creating output directory {}", root.display()))?;
        debug!(output = %root.display(), "output directory prepared");
        Ok(())
    }
}
