//! Build-configuration model and loader.
//!
//! The build configuration is an ini-dialect file with one global `[env]`
//! section supplying shared defaults and one `[env:<name>]` section per
//! build environment. Sections may point at another section with an
//! `extends` property; lookups that miss locally are resolved along that
//! chain (see [`crate::config::inherit`]).
//!
//! The model is loaded once at process start and is immutable afterwards.
//! Section order is preserved: environments are processed in the order
//! their sections appear in the file.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the global defaults section.
pub const GLOBAL_SECTION: &str = "env";

/// Prefix of per-environment sections; the environment identity follows it.
pub const ENV_SECTION_PREFIX: &str = "env:";

/// Errors raised while loading or parsing the build configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read at all
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line is neither a section header, a property, nor a comment
    #[error("malformed configuration at line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    /// A property appeared before the first section header
    #[error("property outside of any section at line {line}")]
    PropertyOutsideSection { line: usize },

    /// The same section name appeared twice
    #[error("duplicate section [{0}]")]
    DuplicateSection(String),

    /// The global `[env]` section is absent
    #[error("configuration defines no global [{GLOBAL_SECTION}] section")]
    MissingGlobalSection,

    /// No `[env:<name>]` sections were found
    #[error("configuration defines no [{ENV_SECTION_PREFIX}<name>] sections")]
    NoEnvironments,
}

/// One named configuration section with its key/value properties.
#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    properties: HashMap<String, String>,
}

impl Section {
    /// Creates an empty section. Used by the parser and by tests.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    /// Section name, including any `env:` prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a property on this section only (no inheritance).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The section this one inherits from, if any.
    pub fn extends(&self) -> Option<&str> {
        self.get(crate::config::inherit::EXTENDS_KEY)
    }

    fn insert(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }

    fn append(&mut self, key: &str, continuation: &str) {
        if let Some(value) = self.properties.get_mut(key) {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(continuation);
        }
    }
}

/// Immutable, ordered collection of configuration sections.
#[derive(Debug, Clone)]
pub struct ConfigModel {
    sections: Vec<Section>,
}

impl ConfigModel {
    /// Loads and parses the configuration file at `path`.
    ///
    /// Fails when the file is unreadable or malformed, when the global
    /// `[env]` section is missing, or when no environment sections exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&text)
    }

    /// Parses configuration text. Same validation rules as [`Self::load`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let sections = parse_sections(text)?;

        if !sections.iter().any(|s| s.name == GLOBAL_SECTION) {
            return Err(ConfigError::MissingGlobalSection);
        }
        if !sections
            .iter()
            .any(|s| s.name.starts_with(ENV_SECTION_PREFIX))
        {
            return Err(ConfigError::NoEnvironments);
        }

        Ok(Self { sections })
    }

    /// All sections in document order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Number of sections in the model. Used to bound inheritance walks.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Looks up a section by exact name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// The global `[env]` section.
    pub fn global(&self) -> Option<&Section> {
        self.section(GLOBAL_SECTION)
    }

    /// Environment sections in document order.
    pub fn environment_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(|s| s.name.starts_with(ENV_SECTION_PREFIX))
    }
}

impl fmt::Display for ConfigModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sections.iter().map(|s| s.name.as_str()).collect();
        write!(f, "ConfigModel[{}]", names.join(", "))
    }
}

/// Parses ini-dialect text into an ordered section list.
///
/// Supported syntax: `[section]` headers, `key = value` properties, `;` and
/// `#` comment lines, and indented continuation lines that are appended to
/// the previous property's value separated by a single space (the dialect
/// used for multi-line `build_flags`).
fn parse_sections(text: &str) -> Result<Vec<Section>, ConfigError> {
    let mut sections: Vec<Section> = Vec::new();
    let mut last_key: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            last_key = None;
            continue;
        }
        if trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }

        // Continuation: indented content following a property.
        if raw.starts_with(char::is_whitespace) && !trimmed.starts_with('[') {
            if let (Some(section), Some(key)) = (sections.last_mut(), last_key.as_deref()) {
                section.append(key, trimmed);
                continue;
            }
        }

        if let Some(header) = trimmed.strip_prefix('[') {
            let Some(name) = header.strip_suffix(']') else {
                return Err(ConfigError::MalformedLine {
                    line,
                    content: trimmed.to_string(),
                });
            };
            let name = name.trim();
            if sections.iter().any(|s| s.name == name) {
                return Err(ConfigError::DuplicateSection(name.to_string()));
            }
            sections.push(Section::new(name));
            last_key = None;
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(ConfigError::MalformedLine {
                line,
                content: trimmed.to_string(),
            });
        };
        let Some(section) = sections.last_mut() else {
            return Err(ConfigError::PropertyOutsideSection { line });
        };
        let key = key.trim().to_string();
        section.insert(key.clone(), value.trim().to_string());
        last_key = Some(key);
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[env]
base_property = shared
build_flags = -DBASE_VERSION=1.2.0

[env:reader]
build_flags = -DENV_VERSION=3

[env:reader-c3]
extends = env:reader
build_flags = -DENV_VERSION=4 -DCHIP_FAMILY=ESP32-C3
";

    #[test]
    fn test_parse_sample() {
        let model = ConfigModel::from_str(SAMPLE).unwrap();
        assert_eq!(model.section_count(), 3);
        assert_eq!(
            model.global().unwrap().get("build_flags"),
            Some("-DBASE_VERSION=1.2.0")
        );
    }

    #[test]
    fn test_environment_sections_in_order() {
        let model = ConfigModel::from_str(SAMPLE).unwrap();
        let names: Vec<&str> = model.environment_sections().map(Section::name).collect();
        assert_eq!(names, vec!["env:reader", "env:reader-c3"]);
    }

    #[test]
    fn test_extends_property() {
        let model = ConfigModel::from_str(SAMPLE).unwrap();
        let section = model.section("env:reader-c3").unwrap();
        assert_eq!(section.extends(), Some("env:reader"));
        assert_eq!(model.section("env:reader").unwrap().extends(), None);
    }

    #[test]
    fn test_comments_are_ignored() {
        let text = "; leading comment\n[env]\n# another\nbuild_flags = -DBASE_VERSION=1\n\n[env:a]\nbuild_flags = -DENV_VERSION=1\n";
        let model = ConfigModel::from_str(text).unwrap();
        assert_eq!(model.section_count(), 2);
    }

    #[test]
    fn test_continuation_lines_join_values() {
        let text = "[env]\nbuild_flags =\n    -DBASE_VERSION=1.0\n    -DEXTRA=1\n\n[env:a]\nbuild_flags = -DENV_VERSION=1\n";
        let model = ConfigModel::from_str(text).unwrap();
        assert_eq!(
            model.global().unwrap().get("build_flags"),
            Some("-DBASE_VERSION=1.0 -DEXTRA=1")
        );
    }

    #[test]
    fn test_missing_global_section() {
        let text = "[env:a]\nbuild_flags = -DENV_VERSION=1\n";
        assert!(matches!(
            ConfigModel::from_str(text),
            Err(ConfigError::MissingGlobalSection)
        ));
    }

    #[test]
    fn test_no_environment_sections() {
        let text = "[env]\nbuild_flags = -DBASE_VERSION=1\n";
        assert!(matches!(
            ConfigModel::from_str(text),
            Err(ConfigError::NoEnvironments)
        ));
    }

    #[test]
    fn test_malformed_line() {
        let text = "[env]\nnot a property\n";
        let err = ConfigModel::from_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_property_outside_section() {
        let text = "orphan = value\n[env]\n";
        assert!(matches!(
            ConfigModel::from_str(text),
            Err(ConfigError::PropertyOutsideSection { line: 1 })
        ));
    }

    #[test]
    fn test_duplicate_section() {
        let text = "[env]\n[env]\n";
        assert!(matches!(
            ConfigModel::from_str(text),
            Err(ConfigError::DuplicateSection(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigModel::load(Path::new("/nonexistent/platformio.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
