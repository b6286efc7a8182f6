//! Name validation for secret categories, secret names, and key names.
//!
//! Names become path components under the secret mount and substitution
//! values in vault location templates, so every public entry point validates
//! before use. The accepted alphabet follows the Kubernetes secret/key naming
//! convention: alphanumerics plus `.` and `-`, with the first and last
//! character required to be alphanumeric. Key names additionally allow `_`
//! in interior positions. This rejects path traversal (`/`, `..`), leading
//! `-`, trailing `.`, whitespace, and empty names.

use crate::errors::{Result, SecretsError};

fn is_valid_name_char(c: char, first_or_last: bool, is_key: bool) -> bool {
    if c.is_ascii_alphanumeric() {
        return true;
    }
    if first_or_last {
        return false;
    }
    if c == '.' || c == '-' {
        return true;
    }
    is_key && c == '_'
}

fn is_valid_name(name: &str, is_key: bool) -> bool {
    let mut chars = name.chars().peekable();
    let mut first = true;
    while let Some(c) = chars.next() {
        let last = chars.peek().is_none();
        if !is_valid_name_char(c, first || last, is_key) {
            return false;
        }
        first = false;
    }
    !name.is_empty()
}

/// Validate a secret category name.
pub fn validate_category_name(category: &str) -> Result<()> {
    if !is_valid_name(category, false) {
        return Err(SecretsError::invalid_name("category", category));
    }
    Ok(())
}

/// Validate a secret name.
pub fn validate_secret_name(secret: &str) -> Result<()> {
    if !is_valid_name(secret, false) {
        return Err(SecretsError::invalid_name("secret", secret));
    }
    Ok(())
}

/// Validate a key name within a secret.
pub fn validate_key_name(key: &str) -> Result<()> {
    if !is_valid_name(key, true) {
        return Err(SecretsError::invalid_name("key", key));
    }
    Ok(())
}

/// Check whether a file name is usable as a secret key, without erroring.
pub fn is_valid_key_name(key: &str) -> bool {
    is_valid_name(key, true)
}
