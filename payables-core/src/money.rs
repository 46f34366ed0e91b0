//! Exact fixed-point handling of monetary input.
//!
//! Amounts are stored as `NUMERIC(10, 2)`: two fractional digits and at most
//! eight integral digits. Input may arrive as a JSON string, integer or float;
//! it is always converted to a `Decimal` without passing through binary
//! floating-point arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{PayablesError, Result};

/// Fractional digits kept for every stored amount.
pub const SCALE: u32 = 2;

/// Largest value a `NUMERIC(10, 2)` column accepts.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_99, SCALE)
}

/// Rounds to two fractional digits, half away from zero.
pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Coerces a JSON value into a non-negative two-digit decimal.
///
/// Strings are parsed exactly, integers are taken as-is and floats go through
/// their shortest round-trip text form, so `0.1` becomes exactly `0.10`.
pub fn coerce_amount(field: &str, value: &Value) -> Result<Decimal> {
    let parsed = match value {
        Value::String(s) => parse_text(field, s)?,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Decimal::from(i)
            } else if let Some(u) = n.as_u64() {
                Decimal::from(u)
            } else if let Some(f) = n.as_f64() {
                parse_text(field, &f.to_string())?
            } else {
                return Err(PayablesError::validation(field, "must be a number"));
            }
        }
        _ => return Err(PayablesError::validation(field, "must be a number")),
    };

    check_amount(field, parsed)
}

/// Validates an already-decimal amount: non-negative and within column range.
pub fn check_amount(field: &str, amount: Decimal) -> Result<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PayablesError::validation(field, "must not be negative"));
    }
    let rounded = round(amount);
    if rounded > max_amount() {
        return Err(PayablesError::validation(
            field,
            format!("must not exceed {}", max_amount()),
        ));
    }
    Ok(rounded)
}

fn parse_text(field: &str, raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str_exact(trimmed)
        .or_else(|_| Decimal::from_str(trimmed))
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| PayablesError::validation(field, format!("`{}` is not a valid amount", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn amount(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_coerce_string() {
        assert_eq!(coerce_amount("amount_paid", &json!("150.75")).unwrap(), amount("150.75"));
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_amount("amount_paid", &json!(200)).unwrap(), amount("200.00"));
    }

    #[test]
    fn test_coerce_float_has_no_binary_drift() {
        assert_eq!(coerce_amount("amount_paid", &json!(0.1)).unwrap(), amount("0.10"));
        assert_eq!(coerce_amount("amount_paid", &json!(19.99)).unwrap(), amount("19.99"));
    }

    #[test]
    fn test_coerce_rounds_to_two_places() {
        assert_eq!(coerce_amount("amount_paid", &json!("10.005")).unwrap(), amount("10.01"));
    }

    #[test]
    fn test_rejects_non_numeric() {
        let err = coerce_amount("amount_paid", &json!("ten dollars")).unwrap_err();
        assert!(matches!(err, PayablesError::Validation { ref field, .. } if field == "amount_paid"));
        assert!(coerce_amount("amount_paid", &json!(true)).is_err());
        assert!(coerce_amount("amount_paid", &Value::Null).is_err());
    }

    #[test]
    fn test_rejects_negative() {
        assert!(coerce_amount("amount_paid", &json!("-5")).is_err());
        assert!(coerce_amount("amount_paid", &json!(-0.01)).is_err());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(coerce_amount("amount_paid", &json!("100000000.00")).is_err());
        assert!(coerce_amount("amount_paid", &json!("99999999.99")).is_ok());
    }
}
