//! Phone canonicalization.
//!
//! Deliberately simple: strip separators, keep digits, require 4..=11 of them.
//! A leading `+country` prefix is stripped of its `+` only; the country digits
//! stay part of the number.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::InvalidPhoneError;

/// Separator characters removed before digit extraction.
const SEPARATORS: [char; 7] = [' ', '+', '(', ')', '-', '－', '—'];

/// Digits kept for the display tail.
const TAIL_LEN: usize = 6;

fn re_canonical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4,11}$").expect("canonical phone pattern"))
}

/// Canonicalize raw input to a comparable digit string.
pub fn normalize(raw: &str) -> Result<String, InvalidPhoneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidPhoneError::Empty);
    }

    let digits: String = trimmed
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .filter(|c| c.is_numeric())
        .collect();

    if re_canonical().is_match(&digits) {
        return Ok(digits);
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(InvalidPhoneError::NonAsciiDigits);
    }
    Err(InvalidPhoneError::DigitCount(digits.chars().count()))
}

/// Last six digits of a normalized phone.
pub fn tail_signature(normalized: &str) -> &str {
    let len = normalized.len();
    if len <= TAIL_LEN {
        normalized
    } else {
        &normalized[len - TAIL_LEN..]
    }
}

/// Mask all but the display tail, e.g. `15551234567` → `*****234567`.
pub fn mask(normalized: &str) -> String {
    let tail = tail_signature(normalized);
    let hidden = normalized.len() - tail.len();
    format!("{}{}", "*".repeat(hidden), tail)
}
