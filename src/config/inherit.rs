//! Section inheritance resolution.
//!
//! A section's `extends` property names another section whose properties
//! are consulted when a lookup misses locally. The walk is bounded by the
//! number of sections in the model so that a cyclic `extends` chain is
//! reported as a configuration error instead of hanging the run. A
//! reference to a section that does not exist terminates the walk as
//! "not found".

use crate::config::defines::extract_define;
use crate::config::model::{ConfigModel, Section};
use crate::environment::BUILD_FLAGS_KEY;
use thiserror::Error;
use tracing::debug;

/// Property naming the section a lookup falls back to.
pub const EXTENDS_KEY: &str = "extends";

/// Inheritance-walk failures.
#[derive(Debug, Error)]
pub enum InheritanceError {
    /// The `extends` chain revisits a section
    #[error("cyclic extends chain detected starting at section [{0}]")]
    CyclicExtends(String),
}

/// Resolves a plain property along the inheritance chain of `start`.
///
/// Returns the first value found together with the name of the section
/// that owns it, or `None` when no section in the chain defines the
/// property.
pub fn resolve_property<'a>(
    model: &'a ConfigModel,
    start: &str,
    key: &str,
) -> Result<Option<(&'a str, &'a str)>, InheritanceError> {
    for section in chain(model, start)? {
        if let Some(value) = section.get(key) {
            return Ok(Some((value, section.name())));
        }
    }
    Ok(None)
}

/// Resolves an embedded `-D<name>=<value>` define along the inheritance
/// chain of `start`.
///
/// Each section contributes only its own `build_flags`; the first section
/// whose flags carry the define wins. Returns the value and the owning
/// section name.
pub fn resolve_define<'a>(
    model: &'a ConfigModel,
    start: &str,
    define: &str,
) -> Result<Option<(String, &'a str)>, InheritanceError> {
    for section in chain(model, start)? {
        if let Some(flags) = section.get(BUILD_FLAGS_KEY) {
            if let Some(value) = extract_define(flags, define) {
                return Ok(Some((value, section.name())));
            }
        }
    }
    Ok(None)
}

/// Collects `start` and its ancestors in walk order.
///
/// The walk is bounded by the section count of the model; exceeding the
/// bound means the chain revisits a section.
fn chain<'a>(model: &'a ConfigModel, start: &str) -> Result<Vec<&'a Section>, InheritanceError> {
    let limit = model.section_count();
    let mut visited = Vec::new();
    let mut current = model.section(start);

    while let Some(section) = current {
        if visited.len() >= limit {
            return Err(InheritanceError::CyclicExtends(start.to_string()));
        }
        visited.push(section);

        current = match section.extends() {
            Some(parent) => {
                let next = model.section(parent);
                if next.is_none() {
                    debug!(
                        section = section.name(),
                        parent, "extends target does not exist; stopping walk"
                    );
                }
                next
            }
            None => None,
        };
    }

    Ok(visited)
}
