//! flashpack - build-matrix firmware packager
//!
//! This library expands a hierarchical build configuration into a list of
//! firmware build environments, drives the external compilation and
//! image-merge tools for each one, and emits the manifests consumed by a
//! web-based flashing tool.
//!
//! # Core Concepts
//!
//! - **Environment**: one named firmware build target derived from one
//!   `[env:<name>]` configuration section, with a resolved version, display
//!   name, and chip family
//! - **Artifact set**: the bootloader, partition-table, application, and
//!   filesystem binaries a build produces for one environment
//! - **Merged image**: a single composite binary with all artifacts baked
//!   in at their flash offsets, flashable in one shot
//! - **Manifest / index**: per-environment flashing instructions plus the
//!   top-level aggregation of all environments in a run
//!
//! # Example Usage
//!
//! ```no_run
//! use flashpack::pipeline::{BuildPipeline, PipelineOptions};
//! use flashpack::tools::SystemRunner;
//!
//! fn run() -> anyhow::Result<()> {
//!     let options = PipelineOptions {
//!         config_path: "platformio.ini".into(),
//!         project_dir: ".".into(),
//!         output_root: "firmware_output".into(),
//!         asset_base: String::new(),
//!     };
//!
//!     let runner = SystemRunner;
//!     let summary = BuildPipeline::new(&runner, options).execute()?;
//!     println!("built {} environments", summary.environments);
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`config`]: configuration model, define extraction, inheritance
//! - [`environment`]: environment resolution
//! - [`pipeline`]: build, partition-offset, and merge steps plus the
//!   sequential orchestrator
//! - [`manifest`]: manifest and index schemas and writers
//! - [`tools`]: external tool invocation seam

// Public modules
pub mod cli;
pub mod config;
pub mod environment;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod tools;
pub mod util;

// Re-export key types for convenient access
pub use config::{ConfigError, ConfigModel};
pub use environment::{Environment, ResolveError};
pub use manifest::{FirmwareIndex, Manifest, ManifestBuilder};
pub use pipeline::{BuildPipeline, PipelineOptions, PipelineSummary};
pub use tools::{SystemRunner, ToolRunner};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_flashpack() {
        assert_eq!(NAME, "flashpack");
    }
}
