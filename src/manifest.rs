//! Flashing manifests and the run index.
//!
//! One `manifest.json` is written per environment in the schema consumed
//! by the web flashing tool; one `index.json` aggregates all environments
//! and is written only after every environment has been processed, so a
//! fatal error anywhere in the batch never publishes a partial index.

use crate::environment::Environment;
use crate::pipeline::merge::MERGED_IMAGE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Per-environment manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Top-level index file name.
pub const INDEX_FILE: &str = "index.json";

/// Manifest or index write failures.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One flashable part: an image file and the offset it is flashed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashPart {
    pub path: String,
    pub offset: u32,
}

/// One build entry inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestBuild {
    #[serde(rename = "chipFamily")]
    pub chip_family: String,
    pub parts: Vec<FlashPart>,
}

/// Per-environment flashing manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub new_install_prompt_erase: bool,
    pub builds: Vec<ManifestBuild>,
}

impl Manifest {
    /// Manifest for one environment whose merged image flashes as a single
    /// part at offset zero (the merge step already baked in the relative
    /// offsets).
    pub fn for_merged_image(environment: &Environment, image_path: impl Into<String>) -> Self {
        Self {
            name: environment.display_name().to_string(),
            version: environment.version.clone(),
            new_install_prompt_erase: true,
            builds: vec![ManifestBuild {
                chip_family: environment.board_family.clone(),
                parts: vec![FlashPart {
                    path: image_path.into(),
                    offset: 0,
                }],
            }],
        }
    }
}

/// One environment's summary inside the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub environment: String,
    pub friendly_name: String,
    pub version: String,
    pub board_family: String,
    pub manifest_path: String,
}

/// Top-level index aggregating every environment of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareIndex {
    pub firmwares: Vec<IndexEntry>,
}

/// Accumulates manifests as environments complete and writes the index
/// once the whole batch has succeeded.
pub struct ManifestBuilder {
    output_root: PathBuf,
    asset_base: String,
    entries: Vec<IndexEntry>,
}

impl ManifestBuilder {
    /// `asset_base` is prefixed to every path recorded in manifests and the
    /// index; empty means paths are relative to the output root.
    pub fn new(output_root: impl Into<PathBuf>, asset_base: impl Into<String>) -> Self {
        let mut asset_base = asset_base.into();
        if !asset_base.is_empty() && !asset_base.ends_with('/') {
            asset_base.push('/');
        }
        Self {
            output_root: output_root.into(),
            asset_base,
            entries: Vec::new(),
        }
    }

    /// Writes the environment's `manifest.json` and queues its index entry.
    pub fn record(&mut self, environment: &Environment) -> Result<PathBuf, ManifestError> {
        let image_ref = format!("{}{}/{}", self.asset_base, environment.name, MERGED_IMAGE);
        let manifest = Manifest::for_merged_image(environment, image_ref);

        let manifest_path = self
            .output_root
            .join(&environment.name)
            .join(MANIFEST_FILE);
        write_json(&manifest_path, &manifest)?;
        debug!(
            environment = environment.name.as_str(),
            path = %manifest_path.display(),
            "manifest written"
        );

        self.entries.push(IndexEntry {
            environment: environment.name.clone(),
            friendly_name: environment.display_name().to_string(),
            version: environment.version.clone(),
            board_family: environment.board_family.clone(),
            manifest_path: format!("{}{}/{}", self.asset_base, environment.name, MANIFEST_FILE),
        });

        Ok(manifest_path)
    }

    /// Writes `index.json` covering every recorded environment.
    pub fn write_index(&self) -> Result<PathBuf, ManifestError> {
        let index = FirmwareIndex {
            firmwares: self.entries.clone(),
        };
        let path = self.output_root.join(INDEX_FILE);
        write_json(&path, &index)?;
        Ok(path)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ManifestError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    })
}
