//! Field-level validation shared by bills and the reference registry.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PayablesError, Result};

static INVOICE_NUMBERS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d,\s]*$").expect("invoice numbers pattern"));

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d*$").expect("digits pattern"));

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("color pattern"));

/// Invoice numbers: digits, commas and whitespace only (e.g. `123, 456`).
pub fn invoice_numbers(field: &str, value: &str) -> Result<()> {
    if INVOICE_NUMBERS_RE.is_match(value) {
        Ok(())
    } else {
        Err(PayablesError::validation(
            field,
            "may only contain digits, commas and spaces",
        ))
    }
}

/// Payment-slip numbers: digits only.
pub fn digits_only(field: &str, value: &str) -> Result<()> {
    if DIGITS_RE.is_match(value) {
        Ok(())
    } else {
        Err(PayablesError::validation(field, "may only contain digits"))
    }
}

pub fn hex_color(field: &str, value: &str) -> Result<()> {
    if HEX_COLOR_RE.is_match(value) {
        Ok(())
    } else {
        Err(PayablesError::validation(field, "must be a #RRGGBB color"))
    }
}

pub fn strip_non_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Company registry number: exactly 14 digits once punctuation is removed.
pub fn cnpj(field: &str, value: &str) -> Result<String> {
    let digits = strip_non_digits(value);
    if digits.len() == 14 {
        Ok(digits)
    } else {
        Err(PayablesError::validation(field, "CNPJ must contain exactly 14 digits"))
    }
}

/// Individual (11 digits) or company (14 digits) tax id. Empty is allowed.
pub fn cpf_or_cnpj(field: &str, value: &str) -> Result<String> {
    let digits = strip_non_digits(value);
    match digits.len() {
        0 | 11 | 14 => Ok(digits),
        _ => Err(PayablesError::validation(
            field,
            "CPF must have 11 digits or CNPJ must have 14 digits",
        )),
    }
}

pub fn required_text(field: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PayablesError::validation(field, "is required"));
    }
    max_length(field, value, max_chars)
}

pub fn max_length(field: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.chars().count() > max_chars {
        return Err(PayablesError::validation(
            field,
            format!("must be at most {} characters", max_chars),
        ));
    }
    Ok(())
}

/// Length limit of a field that is stored uppercased. Uppercasing can
/// lengthen text (`ß` becomes `SS`), so the stored form is what counts.
pub fn max_length_uppercased(field: &str, value: &str, max_chars: usize) -> Result<()> {
    max_length(field, &value.to_uppercase(), max_chars)
}

/// Uppercases in place; empty strings are left alone.
pub fn uppercase(value: &mut String) {
    if !value.is_empty() {
        *value = value.to_uppercase();
    }
}

/// Uppercases in place, then enforces the column limit on the result.
pub fn uppercase_within(field: &str, value: &mut String, max_chars: usize) -> Result<()> {
    uppercase(value);
    max_length(field, value, max_chars)
}
