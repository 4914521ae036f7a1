//! Build-environment resolution.
//!
//! Expands the loaded [`ConfigModel`](crate::config::ConfigModel) into the
//! ordered list of [`Environment`] descriptors the pipeline operates on.
//! Resolution is all-or-nothing: any malformed environment aborts the whole
//! invocation before a single external tool is launched, so a run never
//! produces a partial set of artifacts for a broken configuration.

use crate::config::{
    extract_define, resolve_define, ConfigModel, InheritanceError, ENV_SECTION_PREFIX,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Property holding the free-text compiler flag string.
pub const BUILD_FLAGS_KEY: &str = "build_flags";

/// Explicit chip-family override property on an environment section.
pub const BOARD_FAMILY_KEY: &str = "board_family";

/// Define carrying the shared base version (global section only).
pub const BASE_VERSION_DEFINE: &str = "BASE_VERSION";

/// Define carrying the per-environment version suffix.
pub const ENV_VERSION_DEFINE: &str = "ENV_VERSION";

/// Define carrying the human-friendly display name.
pub const FRIENDLY_NAME_DEFINE: &str = "FRIENDLY_NAME";

/// Define carrying the chip family; inheritable along `extends` chains.
pub const CHIP_FAMILY_DEFINE: &str = "CHIP_FAMILY";

/// Family assumed when neither define nor override resolves one.
pub const DEFAULT_BOARD_FAMILY: &str = "ESP32";

/// Environment-resolution failures. All of these are fatal for the run.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The global section is absent (normally caught at load time)
    #[error("global [env] section is missing")]
    MissingGlobalSection,

    /// The global section has no `build_flags` to carry the base version
    #[error("global [env] section has no {BUILD_FLAGS_KEY}; cannot determine {BASE_VERSION_DEFINE}")]
    MissingGlobalBuildFlags,

    /// The global flags lack the base-version define
    #[error("{BASE_VERSION_DEFINE} define not found in global {BUILD_FLAGS_KEY}")]
    MissingBaseVersion,

    /// An environment section has no `build_flags` of its own
    #[error("environment [env:{0}] has no {BUILD_FLAGS_KEY}")]
    MissingBuildFlags(String),

    /// An environment's flags lack the version-suffix define
    #[error("{ENV_VERSION_DEFINE} define not found in {BUILD_FLAGS_KEY} of environment [env:{0}]")]
    MissingEnvVersion(String),

    /// Cyclic `extends` chain hit while resolving the chip family
    #[error(transparent)]
    Inheritance(#[from] InheritanceError),
}

/// One fully resolved build target, derived from one `[env:<name>]` section.
///
/// Constructed before any compilation is attempted and read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    /// Environment identity (section name without the `env:` prefix).
    pub name: String,

    /// Full version: `<base_version>-<env_version>`.
    pub version: String,

    /// Display name from `FRIENDLY_NAME`, if the flags define one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Resolved chip/board family.
    pub board_family: String,

    /// Raw build flags of the environment's own section.
    #[serde(skip)]
    pub build_flags: String,
}

impl Environment {
    /// Human-facing name: the friendly name when present, the identity
    /// otherwise.
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.name)
    }
}

/// Resolves every environment section of the model, in document order.
///
/// The global `BASE_VERSION` is a precondition for the whole build and is
/// checked once, before the first environment is examined.
pub fn resolve_all(model: &ConfigModel) -> Result<Vec<Environment>, ResolveError> {
    let global = model.global().ok_or(ResolveError::MissingGlobalSection)?;
    let global_flags = global
        .get(BUILD_FLAGS_KEY)
        .ok_or(ResolveError::MissingGlobalBuildFlags)?;
    let base_version =
        extract_define(global_flags, BASE_VERSION_DEFINE).ok_or(ResolveError::MissingBaseVersion)?;
    debug!(base_version, "resolved base version");

    let mut environments = Vec::new();
    for section in model.environment_sections() {
        let name = section
            .name()
            .strip_prefix(ENV_SECTION_PREFIX)
            .unwrap_or(section.name())
            .to_string();

        let flags = section
            .get(BUILD_FLAGS_KEY)
            .ok_or_else(|| ResolveError::MissingBuildFlags(name.clone()))?;

        let env_version = extract_define(flags, ENV_VERSION_DEFINE)
            .ok_or_else(|| ResolveError::MissingEnvVersion(name.clone()))?;
        let friendly_name = extract_define(flags, FRIENDLY_NAME_DEFINE);

        let board_family = resolve_board_family(model, section.name(), &name)?;

        environments.push(Environment {
            name,
            version: format!("{}-{}", base_version, env_version),
            friendly_name,
            board_family,
            build_flags: flags.to_string(),
        });
    }

    Ok(environments)
}

/// Chip-family lookup: inheritance-chain define, then the section's own
/// `board_family` property, then the documented default with a warning.
fn resolve_board_family(
    model: &ConfigModel,
    section_name: &str,
    env_name: &str,
) -> Result<String, ResolveError> {
    if let Some((family, owner)) = resolve_define(model, section_name, CHIP_FAMILY_DEFINE)? {
        debug!(
            environment = env_name,
            family, owner, "chip family resolved from build flags"
        );
        return Ok(family);
    }

    if let Some(section) = model.section(section_name) {
        if let Some(family) = section.get(BOARD_FAMILY_KEY) {
            debug!(
                environment = env_name,
                family, "chip family taken from {BOARD_FAMILY_KEY} property"
            );
            return Ok(family.to_string());
        }
    }

    warn!(
        environment = env_name,
        "no {} define or {} property found; assuming {}",
        CHIP_FAMILY_DEFINE,
        BOARD_FAMILY_KEY,
        DEFAULT_BOARD_FAMILY
    );
    Ok(DEFAULT_BOARD_FAMILY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(text: &str) -> ConfigModel {
        ConfigModel::from_str(text).unwrap()
    }

    #[test]
    fn test_resolve_all_in_order() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=2.1.0\n\n\
             [env:reader]\nbuild_flags = -DENV_VERSION=3 -DCHIP_FAMILY=ESP32\n\n\
             [env:reader-c3]\nbuild_flags = -DENV_VERSION=4 -DCHIP_FAMILY=ESP32-C3\n",
        );

        let environments = resolve_all(&model).unwrap();
        assert_eq!(environments.len(), 2);
        assert_eq!(environments[0].name, "reader");
        assert_eq!(environments[0].version, "2.1.0-3");
        assert_eq!(environments[1].name, "reader-c3");
        assert_eq!(environments[1].board_family, "ESP32-C3");
    }

    #[test]
    fn test_missing_base_version_is_fatal() {
        let model = model(
            "[env]\nbuild_flags = -DOTHER=1\n\n\
             [env:reader]\nbuild_flags = -DENV_VERSION=3\n",
        );
        assert!(matches!(
            resolve_all(&model),
            Err(ResolveError::MissingBaseVersion)
        ));
    }

    #[test]
    fn test_missing_global_build_flags_is_fatal() {
        let model = model(
            "[env]\nother = 1\n\n\
             [env:reader]\nbuild_flags = -DENV_VERSION=3\n",
        );
        assert!(matches!(
            resolve_all(&model),
            Err(ResolveError::MissingGlobalBuildFlags)
        ));
    }

    #[test]
    fn test_missing_env_build_flags_is_fatal() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1\n\n\
             [env:reader]\nboard = esp32dev\n",
        );
        let err = resolve_all(&model).unwrap_err();
        assert!(matches!(err, ResolveError::MissingBuildFlags(name) if name == "reader"));
    }

    #[test]
    fn test_missing_env_version_is_fatal() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1\n\n\
             [env:reader]\nbuild_flags = -DCHIP_FAMILY=ESP32\n",
        );
        let err = resolve_all(&model).unwrap_err();
        assert!(matches!(err, ResolveError::MissingEnvVersion(name) if name == "reader"));
    }

    #[test]
    fn test_env_version_is_not_inherited() {
        // ENV_VERSION must come from the environment's own flags.
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1 -DENV_VERSION=9\n\n\
             [env:reader]\nextends = env\nbuild_flags = -DCHIP_FAMILY=ESP32\n",
        );
        assert!(matches!(
            resolve_all(&model),
            Err(ResolveError::MissingEnvVersion(_))
        ));
    }

    #[test]
    fn test_friendly_name_fallback() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1\n\n\
             [env:reader]\nbuild_flags = -DENV_VERSION=1 -DFRIENDLY_NAME=\"Door Reader\"\n\n\
             [env:bare]\nbuild_flags = -DENV_VERSION=1\n",
        );

        let environments = resolve_all(&model).unwrap();
        assert_eq!(environments[0].display_name(), "Door Reader");
        assert_eq!(environments[1].friendly_name, None);
        assert_eq!(environments[1].display_name(), "bare");
    }

    #[test]
    fn test_chip_family_via_inheritance() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1\n\n\
             [env:reader]\nextends = c3_base\nbuild_flags = -DENV_VERSION=1\n\n\
             [c3_base]\nbuild_flags = -DCHIP_FAMILY=ESP32-C3\n",
        );

        let environments = resolve_all(&model).unwrap();
        assert_eq!(environments[0].board_family, "ESP32-C3");
    }

    #[test]
    fn test_board_family_property_fallback() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1\n\n\
             [env:reader]\nbuild_flags = -DENV_VERSION=1\nboard_family = ESP32-S3\n",
        );

        let environments = resolve_all(&model).unwrap();
        assert_eq!(environments[0].board_family, "ESP32-S3");
    }

    #[test]
    fn test_default_family_when_unresolvable() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1\n\n\
             [env:reader]\nbuild_flags = -DENV_VERSION=1\n",
        );

        let environments = resolve_all(&model).unwrap();
        assert_eq!(environments[0].board_family, DEFAULT_BOARD_FAMILY);
    }

    #[test]
    fn test_cyclic_extends_is_fatal() {
        let model = model(
            "[env]\nbuild_flags = -DBASE_VERSION=1\n\n\
             [env:reader]\nextends = other\nbuild_flags = -DENV_VERSION=1\n\n\
             [other]\nextends = env:reader\n",
        );
        assert!(matches!(
            resolve_all(&model),
            Err(ResolveError::Inheritance(_))
        ));
    }
}
