//! Internal helpers for input validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::Validation(format!("invalid {label} id")))
}

pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|v| parse_uuid(v, label)).transpose()
}

/// Trim `value` and reject it when nothing is left.
pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn require_positive(value: i64, label: &str) -> ResultEngine<()> {
    if value <= 0 {
        return Err(EngineError::Validation(format!("{label} must be > 0")));
    }
    Ok(())
}

/// Normalizes a product name for matching: strips accents, lowercases and
/// collapses every run of non-alphanumeric characters into one space.
pub(crate) fn normalize_key(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_space = true;
    for ch in value.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Human facing reference number such as `PO-2026-00042`. Values past
/// `99999` keep all their digits.
pub(crate) fn reference_number(prefix: &str, year: i32, value: i64) -> String {
    format!("{prefix}-{year}-{value:05}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_key_folds_accents_and_punctuation() {
        assert_eq!(normalize_key("  Pomade  (Strong Hold) "), "pomade strong hold");
        assert_eq!(normalize_key("Crème-Gel"), "creme gel");
        assert_eq!(normalize_key("---"), "");
    }

    #[test]
    fn reference_number_pads_to_five_digits() {
        assert_eq!(reference_number("PO", 2026, 42), "PO-2026-00042");
        assert_eq!(reference_number("BATCH", 2026, 123_456), "BATCH-2026-123456");
    }

    #[test]
    fn required_text_is_trimmed() {
        assert_eq!(normalize_required_text("  ok ", "reason").unwrap(), "ok");
        assert_eq!(
            normalize_required_text("   ", "reason"),
            Err(EngineError::Validation("reason must not be empty".to_string()))
        );
    }
}
