//! Subcommand handlers.
//!
//! Each handler converts its outcome into a process exit code: zero only
//! when the requested operation completed end to end.

use super::commands::{BuildArgs, EnvironmentsArgs};
use super::output::OutputFormatter;
use crate::config::ConfigModel;
use crate::environment;
use crate::pipeline::{BuildPipeline, PipelineOptions};
use crate::progress::LoggingHandler;
use crate::tools::SystemRunner;
use anyhow::Result;
use tracing::error;

/// Runs the full build pipeline.
pub fn handle_build(args: &BuildArgs) -> i32 {
    let options = PipelineOptions {
        config_path: args.config.clone(),
        project_dir: args.project_dir.clone(),
        output_root: args.output_dir.clone(),
        asset_base: args.asset_base.clone(),
    };

    let runner = SystemRunner;
    let progress = LoggingHandler;
    let pipeline = BuildPipeline::new(&runner, options).with_progress(&progress);

    match pipeline.execute() {
        Ok(summary) => {
            println!(
                "Built {} environment(s); index written to {}",
                summary.environments,
                summary.index_path.display()
            );
            0
        }
        Err(err) => {
            error!("build failed: {:#}", err);
            1
        }
    }
}

/// Resolves and prints the environment list without building anything.
pub fn handle_environments(args: &EnvironmentsArgs) -> i32 {
    match resolve_and_format(args) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(err) => {
            error!("failed to resolve environments: {:#}", err);
            1
        }
    }
}

fn resolve_and_format(args: &EnvironmentsArgs) -> Result<String> {
    let model = ConfigModel::load(&args.config)?;
    let environments = environment::resolve_all(&model)?;
    OutputFormatter::new(args.format.into()).format_environments(&environments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::OutputFormatArg;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
[env]
build_flags = -DBASE_VERSION=1.0

[env:reader]
build_flags = -DENV_VERSION=2 -DCHIP_FAMILY=ESP32
";

    #[test]
    fn test_environments_handler_success() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("platformio.ini");
        fs::write(&config, SAMPLE).unwrap();

        let args = EnvironmentsArgs {
            config,
            format: OutputFormatArg::Json,
        };
        assert_eq!(handle_environments(&args), 0);
    }

    #[test]
    fn test_environments_handler_missing_config() {
        let args = EnvironmentsArgs {
            config: "/nonexistent/platformio.ini".into(),
            format: OutputFormatArg::Human,
        };
        assert_eq!(handle_environments(&args), 1);
    }
}
