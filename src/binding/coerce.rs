//! Built-in coercion of decoded text into typed values.
//!
//! # Responsibilities
//! - Parse integers: optional sign and digits only
//! - Parse floats and decimals: decimal or exponential notation
//! - Report unparseable text as "no value", never as an error
//!
//! # Design Decisions
//! - Culture-invariant: `.` is the only decimal point, group separators are
//!   rejected regardless of the host locale
//! - Surrounding ASCII whitespace is tolerated, as in invariant number parsing
//! - Float overflow saturates to infinity; integer and decimal overflow fail
//! - Decimal underflow rounds to the nearest representable value, down to zero

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::binding::value::{ParamKind, Value};

/// Most fractional digits a decimal can hold.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Result of applying built-in coercion to one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// The fragment parsed into a value of the declared kind.
    Parsed(Value),
    /// The fragment is not valid for the declared kind.
    Invalid,
    /// The declared kind has no built-in parser.
    Unsupported,
}

/// Coerce decoded text into a value of the given kind.
pub fn coerce(kind: ParamKind, text: &str) -> Coercion {
    let parsed = match kind {
        ParamKind::Str => Some(Value::Str(text.to_string())),
        ParamKind::Int => parse_int(text).map(Value::Int),
        ParamKind::Long => parse_long(text).map(Value::Long),
        ParamKind::Float => parse_float(text).map(Value::Float),
        ParamKind::Double => parse_double(text).map(Value::Double),
        ParamKind::Decimal => parse_decimal(text).map(Value::Decimal),
        ParamKind::Custom(_) => return Coercion::Unsupported,
    };
    match parsed {
        Some(value) => Coercion::Parsed(value),
        None => Coercion::Invalid,
    }
}

pub fn parse_int(text: &str) -> Option<i32> {
    parse_integer(text)
}

pub fn parse_long(text: &str) -> Option<i64> {
    parse_integer(text)
}

pub fn parse_float(text: &str) -> Option<f32> {
    let text = trim(text);
    if !is_float_literal(text) && !is_special_float(text) {
        return None;
    }
    f32::from_str(text).ok()
}

pub fn parse_double(text: &str) -> Option<f64> {
    let text = trim(text);
    if !is_float_literal(text) && !is_special_float(text) {
        return None;
    }
    f64::from_str(text).ok()
}

pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = trim(text);
    if !is_float_literal(text) {
        return None;
    }
    let unsigned = text.strip_prefix('+').unwrap_or(text);
    match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => scale_decimal(Decimal::from_str(mantissa).ok()?, exponent),
        None => Decimal::from_str(unsigned).ok(),
    }
}

/// `mantissa * 10^exponent`. Results below the smallest representable
/// magnitude round to zero; results above the largest fail.
fn scale_decimal(mantissa: Decimal, exponent: &str) -> Option<Decimal> {
    if mantissa.is_zero() {
        return Some(Decimal::ZERO);
    }
    let negative = exponent.starts_with('-');
    let Ok(magnitude) = exponent.trim_start_matches(['+', '-']).parse::<u32>() else {
        return negative.then_some(Decimal::ZERO);
    };

    if !negative {
        let mut value = mantissa;
        for _ in 0..magnitude {
            value = value.checked_mul(Decimal::TEN)?;
        }
        return Some(value);
    }

    let scale = mantissa.scale().saturating_add(magnitude);
    if scale <= MAX_DECIMAL_SCALE {
        let mut value = mantissa;
        value.set_scale(scale).ok()?;
        return Some(value);
    }

    // Drop the digits past the last representable place, rounding half away from zero.
    let excess = scale - MAX_DECIMAL_SCALE;
    if excess > 30 {
        return Some(Decimal::ZERO);
    }
    let divisor = 10i128.pow(excess);
    let digits = mantissa.mantissa();
    let rounded = (digits + digits.signum() * (divisor / 2)) / divisor;
    Decimal::try_from_i128_with_scale(rounded, MAX_DECIMAL_SCALE).ok()
}

fn parse_integer<T: FromStr>(text: &str) -> Option<T> {
    let text = trim(text);
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn trim(text: &str) -> &str {
    text.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r'))
}

/// `[sign] (digits [. digits*] | . digits) [(e|E) [sign] digits]`
fn is_float_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let integral = count_digits(&bytes[i..]);
    i += integral;
    let mut fractional = 0;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        fractional = count_digits(&bytes[i..]);
        i += fractional;
    }
    if integral == 0 && fractional == 0 {
        return false;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exponent = count_digits(&bytes[i..]);
        if exponent == 0 {
            return false;
        }
        i += exponent;
    }

    i == bytes.len()
}

fn is_special_float(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    unsigned.eq_ignore_ascii_case("infinity") || unsigned.eq_ignore_ascii_case("nan")
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("+42"), Some(42));
        assert_eq!(parse_int(" 42 "), Some(42));
        assert_eq!(parse_long("-7"), Some(-7));
        assert_eq!(parse_long("9223372036854775807"), Some(i64::MAX));
    }

    #[test]
    fn test_integers_rejected() {
        for text in ["abc", "", "-", "1,000", "1_000", "1.0", "0x10", "12a", "1 2"] {
            assert_eq!(parse_int(text), None, "{text:?} should not parse");
        }
        // Overflow is a parse failure, not a wrap.
        assert_eq!(parse_int("2147483648"), None);
        assert_eq!(parse_int("2147483647"), Some(i32::MAX));
    }

    #[test]
    fn test_floats_use_invariant_decimal_point() {
        assert_eq!(parse_double("3.14"), Some(3.14));
        assert_eq!(parse_double("-0.5"), Some(-0.5));
        assert_eq!(parse_double(".5"), Some(0.5));
        assert_eq!(parse_double("5."), Some(5.0));
        assert_eq!(parse_double("1e3"), Some(1000.0));
        assert_eq!(parse_double("2.5E-1"), Some(0.25));
        assert_eq!(parse_float("1.5"), Some(1.5f32));
        assert_eq!(parse_double("3,14"), None);
        assert_eq!(parse_double("1e"), None);
        assert_eq!(parse_double("."), None);
        assert_eq!(parse_double("1.2.3"), None);
    }

    #[test]
    fn test_special_floats() {
        assert_eq!(parse_double("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_double("-Infinity"), Some(f64::NEG_INFINITY));
        assert!(parse_double("NaN").unwrap().is_nan());
        assert_eq!(parse_double("1e400"), Some(f64::INFINITY));
    }

    #[test]
    fn test_decimals() {
        assert_eq!(parse_decimal("3.14"), Decimal::from_str("3.14").ok());
        assert_eq!(parse_decimal("+10"), Some(Decimal::from(10)));
        assert_eq!(parse_decimal("-0.001"), Decimal::from_str("-0.001").ok());
        assert_eq!(parse_decimal("1.5e2"), Some(Decimal::from(150)));
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("1_0"), None);
    }

    #[test]
    fn test_decimal_exponent_range() {
        assert_eq!(parse_decimal("1e-30"), Some(Decimal::ZERO));
        assert_eq!(parse_decimal("-1e-30"), Some(Decimal::ZERO));
        assert_eq!(parse_decimal("1e-99999999999"), Some(Decimal::ZERO));
        assert_eq!(parse_decimal("1e-28"), Decimal::from_str("0.0000000000000000000000000001").ok());
        assert_eq!(parse_decimal("1.5e-28"), Decimal::from_str("0.0000000000000000000000000002").ok());
        assert_eq!(parse_decimal("4e-29"), Some(Decimal::ZERO));
        assert_eq!(parse_decimal("0e400"), Some(Decimal::ZERO));
        assert_eq!(parse_decimal("1e40"), None);
        assert_eq!(parse_decimal("1e99999999999"), None);
        assert_eq!(parse_decimal("2E3"), Some(Decimal::from(2000)));
    }

    #[test]
    fn test_coerce_by_kind() {
        assert_eq!(coerce(ParamKind::Int, "42"), Coercion::Parsed(Value::Int(42)));
        assert_eq!(coerce(ParamKind::Long, "-7"), Coercion::Parsed(Value::Long(-7)));
        assert_eq!(coerce(ParamKind::Double, "3.14"), Coercion::Parsed(Value::Double(3.14)));
        assert_eq!(coerce(ParamKind::Str, "abc"), Coercion::Parsed(Value::from("abc")));
        assert_eq!(coerce(ParamKind::Int, "abc"), Coercion::Invalid);
        assert_eq!(coerce(ParamKind::Custom("point"), "1,2"), Coercion::Unsupported);
    }
}
