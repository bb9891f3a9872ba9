//! Syntax rules for key strings and language codes.
//!
//! Pure and deterministic. Callers decide when to run them (on submit, on
//! every keystroke, ...); the command processor always runs them before
//! touching state.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("must not be empty")]
    Empty,

    #[error("segment {position} is empty")]
    EmptySegment { position: usize },

    #[error(
        "segment '{segment}' must start with a lowercase letter, end with a letter or digit \
         and contain only a-z, 0-9, '_' or '-'"
    )]
    InvalidSegment { segment: String },

    #[error("code must start with a lowercase letter and contain only letters, digits, '_' or '-'")]
    InvalidCode,

    #[error("longer than {max} characters")]
    TooLong { max: usize },
}

/// Longest accepted language code
pub const MAX_LANGUAGE_CODE_LENGTH: usize = 35;

// Compiled once, shared by every validation call
static KEY_SEGMENT_REGEX: OnceLock<Regex> = OnceLock::new();
static LANGUAGE_CODE_REGEX: OnceLock<Regex> = OnceLock::new();

fn key_segment_regex() -> &'static Regex {
    KEY_SEGMENT_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z]+([a-z0-9_-]*[a-z0-9]+)?$").expect("key segment pattern is valid")
    })
}

fn language_code_regex() -> &'static Regex {
    LANGUAGE_CODE_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z]+([a-zA-Z0-9_-]*[a-zA-Z0-9]+)?$").expect("language code pattern is valid")
    })
}

/// Validate a single dot-free key segment.
pub fn validate_key_segment(segment: &str) -> Result<(), InvalidReason> {
    if key_segment_regex().is_match(segment) {
        Ok(())
    } else {
        Err(InvalidReason::InvalidSegment {
            segment: segment.to_string(),
        })
    }
}

/// Validate a full key: every dot-separated segment must be valid.
pub fn validate_key(key: &str) -> Result<(), InvalidReason> {
    if key.is_empty() {
        return Err(InvalidReason::Empty);
    }

    for (position, segment) in key.split('.').enumerate() {
        if segment.is_empty() {
            return Err(InvalidReason::EmptySegment { position });
        }
        validate_key_segment(segment)?;
    }

    Ok(())
}

/// Validate a language code such as `en`, `pt-BR` or `zh_Hant`.
pub fn validate_language_code(code: &str) -> Result<(), InvalidReason> {
    if code.is_empty() {
        return Err(InvalidReason::Empty);
    }
    if code.len() > MAX_LANGUAGE_CODE_LENGTH {
        return Err(InvalidReason::TooLong {
            max: MAX_LANGUAGE_CODE_LENGTH,
        });
    }
    if !language_code_regex().is_match(code) {
        return Err(InvalidReason::InvalidCode);
    }
    Ok(())
}
