pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildArgs, CliArgs, Commands, EnvironmentsArgs};
pub use output::{OutputFormat, OutputFormatter};
