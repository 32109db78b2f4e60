//! Validation of producer-supplied submission parameters.
//!
//! Malformed parameters are rejected here, synchronously, before a job row
//! is ever created.

use crate::error::CoreError;

/// Maximum length of a job target URL.
const MAX_TARGET_LEN: usize = 2048;

/// Maximum length of a language code (`aa` or `aa-BB` shapes fit well
/// under this).
const MAX_LANGUAGE_LEN: usize = 8;

/// Validate a job target.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_TARGET_LEN` characters.
/// - Must not contain whitespace or control characters.
/// - Must carry an `http://` or `https://` scheme.
pub fn validate_target(target: &str) -> Result<(), CoreError> {
    if target.is_empty() {
        return Err(CoreError::Validation(
            "target must not be empty".to_string(),
        ));
    }
    if target.len() > MAX_TARGET_LEN {
        return Err(CoreError::Validation(format!(
            "target must not exceed {MAX_TARGET_LEN} characters"
        )));
    }
    if target.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::Validation(
            "target must not contain whitespace or control characters".to_string(),
        ));
    }
    if !target.starts_with("http://") && !target.starts_with("https://") {
        return Err(CoreError::Validation(
            "target must be an http:// or https:// URL".to_string(),
        ));
    }
    Ok(())
}

/// Validate a language code.
///
/// Accepts two lowercase letters, optionally followed by a hyphen and two
/// to four alphanumeric characters (`en`, `pt-BR`, `zh-Hant`).
pub fn validate_language(language: &str) -> Result<(), CoreError> {
    if language.is_empty() || language.len() > MAX_LANGUAGE_LEN {
        return Err(CoreError::Validation(format!(
            "language must be 1..={MAX_LANGUAGE_LEN} characters"
        )));
    }

    let (primary, region) = match language.split_once('-') {
        Some((p, r)) => (p, Some(r)),
        None => (language, None),
    };

    let primary_ok = primary.len() == 2 && primary.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = match region {
        None => true,
        Some(r) => (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric()),
    };

    if !primary_ok || !region_ok {
        return Err(CoreError::Validation(format!(
            "language \"{language}\" is not a valid code (expected e.g. \"en\" or \"pt-BR\")"
        )));
    }
    Ok(())
}
