//! Reference name normalization.
//!
//! Reference names end up as file names, so they are folded to lowercase and
//! any path separator is replaced with `_`. Names that would be hidden files
//! or directory traversal are rejected outright.

use crate::error::{RefError, Result};

/// Characters replaced with `_` during normalization.
const SEPARATORS: &[char] = &['/', '\\', ':'];

/// Normalize a reference name into its canonical stored form.
///
/// ```
/// use hb_refs::normalize_name;
///
/// assert_eq!(normalize_name("Source-Laptop").unwrap(), "source-laptop");
/// assert_eq!(normalize_name("peer-home/nas").unwrap(), "peer-home_nas");
/// assert!(normalize_name("").is_err());
/// ```
pub fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RefError::InvalidName {
            name: name.to_string(),
            reason: "must not be empty".into(),
        });
    }
    if trimmed.starts_with('.') {
        return Err(RefError::InvalidName {
            name: name.to_string(),
            reason: "must not start with '.'".into(),
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(RefError::InvalidName {
            name: name.to_string(),
            reason: "must not contain control characters".into(),
        });
    }

    Ok(trimmed
        .chars()
        .map(|c| if SEPARATORS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .to_lowercase())
}
