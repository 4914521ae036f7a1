use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Build-matrix firmware packager producing web-flashable merged images
#[derive(Parser, Debug)]
#[command(
    name = "flashpack",
    about = "Build-matrix firmware packager producing web-flashable merged images",
    version,
    long_about = "flashpack expands a hierarchical build configuration into a list of \
                  firmware environments, compiles each one with the external build tool, \
                  merges the resulting binaries into a single flashable image per \
                  environment, and emits the manifests consumed by a web-based \
                  flashing tool."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Verbose output (debug logging)")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build every environment and emit flashing manifests",
        long_about = "Compiles every environment in the build configuration, merges the \
                      binaries of each into one composite image, and writes per-environment \
                      manifests plus a top-level index.\n\n\
                      Examples:\n  \
                      flashpack build\n  \
                      flashpack build --config firmware/platformio.ini\n  \
                      flashpack build --output-dir dist --asset-base _assets"
    )]
    Build(BuildArgs),

    #[command(
        about = "Resolve and list the environments without building",
        long_about = "Parses the build configuration and prints the resolved environment \
                      descriptors. No external tool is invoked.\n\n\
                      Examples:\n  \
                      flashpack environments\n  \
                      flashpack environments --format json"
    )]
    Environments(EnvironmentsArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = "platformio.ini",
        help = "Build configuration file"
    )]
    pub config: PathBuf,

    #[arg(
        long,
        value_name = "DIR",
        default_value = ".",
        help = "Project directory the build tool runs in"
    )]
    pub project_dir: PathBuf,

    #[arg(
        short = 'o',
        long,
        value_name = "DIR",
        default_value = "firmware_output",
        help = "Output directory (removed and recreated on every run)"
    )]
    pub output_dir: PathBuf,

    #[arg(
        long,
        value_name = "PREFIX",
        default_value = "",
        help = "Path prefix for image and manifest references in the emitted JSON"
    )]
    pub asset_base: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EnvironmentsArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = "platformio.ini",
        help = "Build configuration file"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
