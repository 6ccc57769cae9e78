//! Amount helpers for fee calculations
//!
//! Every amount is a [`Decimal`] in whole currency units (baht). Shares are
//! rounded up to the next whole unit so the club never undercharges.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Round an amount up to the next whole unit
pub fn ceil_units(amount: Decimal) -> Decimal {
    amount.ceil().normalize()
}

/// Subtraction that floors at zero instead of going negative
pub fn safe_sub(amount: Decimal, discount: Decimal) -> Decimal {
    (amount - discount).max(Decimal::ZERO)
}

/// Read a loosely typed store value as an amount.
///
/// `Ok(None)` means absent (`null` or a blank string). `Err` carries the
/// offending text for anything that is not a non-negative number.
pub fn parse_amount(value: &Value) -> Result<Option<Decimal>, String> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            parse_decimal(text)
        }
        other => return Err(other.to_string()),
    };

    match parsed {
        Some(amount) if !amount.is_sign_negative() || amount.is_zero() => Ok(Some(amount)),
        _ => Err(display_value(value)),
    }
}

/// Format an amount without trailing zeros (`60`, `12.5`)
pub fn format_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text).ok().or_else(|| Decimal::from_scientific(text).ok())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ceil_units() {
        assert_eq!(ceil_units(Decimal::new(2501, 2)), Decimal::from(26));
        assert_eq!(ceil_units(Decimal::from(25)), Decimal::from(25));
        assert_eq!(ceil_units(Decimal::new(3334, 2)), Decimal::from(34));
    }

    #[test]
    fn test_safe_sub() {
        assert_eq!(safe_sub(Decimal::from(60), Decimal::from(30)), Decimal::from(30));
        assert_eq!(safe_sub(Decimal::from(20), Decimal::from(50)), Decimal::ZERO);
    }

    #[test]
    fn test_parse_amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_amount(&json!(100)), Ok(Some(Decimal::from(100))));
        assert_eq!(parse_amount(&json!(5.5)), Ok(Some(Decimal::new(55, 1))));
        assert_eq!(parse_amount(&json!(" 20 ")), Ok(Some(Decimal::from(20))));
        assert_eq!(parse_amount(&json!(0)), Ok(Some(Decimal::ZERO)));
    }

    #[test]
    fn test_parse_amount_absent_values() {
        assert_eq!(parse_amount(&Value::Null), Ok(None));
        assert_eq!(parse_amount(&json!("")), Ok(None));
        assert_eq!(parse_amount(&json!("   ")), Ok(None));
    }

    #[test]
    fn test_parse_amount_rejects_garbage_and_negatives() {
        assert_eq!(parse_amount(&json!("abc")), Err("abc".to_string()));
        assert_eq!(parse_amount(&json!(-5)), Err("-5".to_string()));
        assert_eq!(parse_amount(&json!(true)), Err("true".to_string()));
        assert!(parse_amount(&json!([1])).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(6000, 2)), "60");
        assert_eq!(format_amount(Decimal::new(125, 1)), "12.5");
    }
}
