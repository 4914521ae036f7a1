//! Output formatting for the environments listing.
//!
//! Supports machine-readable JSON and YAML plus a human-readable table.

use crate::environment::Environment;
use anyhow::{Context, Result};

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// Formatter for resolved environment listings.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the environment list according to the configured format.
    pub fn format_environments(&self, environments: &[Environment]) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(environments)
                .context("Failed to serialize environments to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(environments)
                .context("Failed to serialize environments to YAML"),
            OutputFormat::Human => Ok(format_human(environments)),
        }
    }
}

fn format_human(environments: &[Environment]) -> String {
    let mut out = format!("Environments ({}):\n", environments.len());
    for env in environments {
        out.push_str(&format!(
            "  {:<24} {:<16} {:<10} {}\n",
            env.name,
            env.version,
            env.board_family,
            env.display_name()
        ));
    }
    out
}
