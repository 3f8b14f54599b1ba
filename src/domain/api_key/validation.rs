//! API key validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Random bytes behind every key value (160 bits)
pub const KEY_VALUE_BYTES: usize = 20;

/// Hex characters per dash-separated segment of a key value
pub const KEY_SEGMENT_LEN: usize = 8;

/// Maximum length of a key label
pub const MAX_LABEL_LENGTH: usize = 255;

/// Most segments a presented value may carry before it is rejected unseen
const MAX_KEY_SEGMENTS: usize = 16;

/// Grouped lowercase hex, e.g. `1a2b3c4d-5e6f7a8b-...`
///
/// Shorter groupings are accepted so that keys issued with fewer random
/// bytes remain valid.
static KEY_VALUE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"^[0-9a-f]{{{len}}}(-[0-9a-f]{{{len}}}){{0,{rest}}}$",
        len = KEY_SEGMENT_LEN,
        rest = MAX_KEY_SEGMENTS - 1
    );
    Regex::new(&pattern).expect("key value pattern is a valid regex")
});

/// Errors that can occur while validating API key input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeyValidationError {
    #[error("Invalid API key ID '{0}': expected a UUID")]
    InvalidId(String),

    #[error("Label exceeds maximum length of {0} characters")]
    LabelTooLong(usize),
}

/// Validate a key label
///
/// Labels are free text; only the length is bounded.
pub fn validate_label(label: &str) -> Result<(), KeyValidationError> {
    if label.chars().count() > MAX_LABEL_LENGTH {
        return Err(KeyValidationError::LabelTooLong(MAX_LABEL_LENGTH));
    }

    Ok(())
}

/// Check whether a presented value has the shape of an issued key
pub fn is_well_formed_value(value: &str) -> bool {
    KEY_VALUE_PATTERN.is_match(value)
}
