//! SQL identifier validation.
//!
//! Table and column names are spliced into generated SQL unquoted, so every
//! name a model declares is checked once when the model is described.

use crate::error::{ConfigError, Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$"));

/// Check whether `name` is a plain SQL identifier.
///
/// # Examples
///
/// ```
/// use relmap_core::is_plain_identifier;
///
/// assert!(is_plain_identifier("AUTHOR_BOOK"));
/// assert!(!is_plain_identifier("user name"));
/// assert!(!is_plain_identifier("1st"));
/// ```
pub fn is_plain_identifier(name: &str) -> bool {
    match &*IDENTIFIER {
        Ok(pattern) => pattern.is_match(name),
        Err(_) => false,
    }
}

/// Fail with a configuration error unless `name` is a plain identifier.
pub fn validate_identifier(what: &str, name: &str) -> Result<()> {
    if let Err(e) = &*IDENTIFIER {
        return Err(Error::Config(ConfigError {
            message: "identifier pattern failed to compile".to_string(),
            source: Some(Box::new(e.clone())),
        }));
    }
    if is_plain_identifier(name) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} `{}` is not a valid SQL identifier",
            what, name
        )))
    }
}
