//! Naming rules for indices and aliases.
//!
//! Mirrors what the engine itself rejects so that bad names fail before any
//! remote call is made.

use crate::error::TypesError;

/// Longest name the engine accepts, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

const FORBIDDEN_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ':'];

/// Validate an index name.
pub fn validate_index_name(name: &str) -> Result<(), TypesError> {
    validate_name("index name", name)
}

/// Validate an alias. Aliases share the index namespace.
pub fn validate_alias(alias: &str) -> Result<(), TypesError> {
    validate_name("alias", alias)
}

fn validate_name(kind: &str, name: &str) -> Result<(), TypesError> {
    let invalid = |reason: &str| {
        Err(TypesError::InvalidInput(format!(
            "{} '{}' {}",
            kind, name, reason
        )))
    };

    if name.is_empty() {
        return Err(TypesError::InvalidInput(format!("{} must not be empty", kind)));
    }
    if name.len() > MAX_NAME_BYTES {
        return invalid("is longer than 255 bytes");
    }
    if name == "." || name == ".." {
        return invalid("is reserved");
    }
    if name.starts_with(['-', '_', '+']) {
        return invalid("must not start with '-', '_' or '+'");
    }
    if name.chars().any(|c| c.is_uppercase()) {
        return invalid("must be lowercase");
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || FORBIDDEN_CHARS.contains(&c))
    {
        return invalid("contains a forbidden character");
    }
    Ok(())
}
