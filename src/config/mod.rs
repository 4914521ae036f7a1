//! Build-configuration parsing and resolution.

pub mod defines;
pub mod inherit;
pub mod model;

pub use defines::extract_define;
pub use inherit::{resolve_define, resolve_property, InheritanceError};
pub use model::{ConfigError, ConfigModel, Section, ENV_SECTION_PREFIX, GLOBAL_SECTION};
