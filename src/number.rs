//! Textual numbers as they travel in arguments and stored values.

use bytes::Bytes;
use std::str;

use crate::error::CommandError;

pub fn parse_integer(bytes: &[u8]) -> Result<i64, CommandError> {
    str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::NotInteger)
}

/// Accepts decimal and exponent notation as well as `inf`, `+inf` and `-inf`. NaN is rejected.
pub fn parse_float(bytes: &[u8]) -> Result<f64, CommandError> {
    str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|value| !value.is_nan())
        .ok_or(CommandError::NotFloat)
}

pub fn format_integer(value: i64) -> Bytes {
    Bytes::from(value.to_string())
}

/// Shortest text that parses back to `value`: `3`, `1.5`, `-0.25`, `inf`.
///
/// Magnitudes below `1e-4` or from `1e17` up switch to exponent form (`1e+300`, `2.5e-07`), the
/// way `%.17g` does. Negative zero is written as `0`.
pub fn format_float(value: f64) -> Bytes {
    if value == 0.0 {
        return Bytes::from_static(b"0");
    }
    if !value.is_finite() {
        return Bytes::from(value.to_string());
    }

    let scientific = format!("{value:e}");
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or_default()),
        None => (scientific.as_str(), 0),
    };

    if (-4..17).contains(&exponent) {
        Bytes::from(value.to_string())
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        Bytes::from(format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_integer(b"42").unwrap(), 42);
        assert_eq!(parse_integer(b"-7").unwrap(), -7);
        assert!(matches!(parse_integer(b"4.2"), Err(CommandError::NotInteger)));
        assert!(matches!(parse_integer(b""), Err(CommandError::NotInteger)));
        assert!(matches!(
            parse_integer(b"9223372036854775808"),
            Err(CommandError::NotInteger)
        ));
        assert_eq!(format_integer(i64::MIN), "-9223372036854775808");
    }

    #[test]
    fn floats() {
        assert_eq!(parse_float(b"1.5").unwrap(), 1.5);
        assert_eq!(parse_float(b"1e3").unwrap(), 1000.0);
        assert_eq!(parse_float(b"-inf").unwrap(), f64::NEG_INFINITY);
        assert_eq!(parse_float(b"+inf").unwrap(), f64::INFINITY);
        assert!(matches!(parse_float(b"nan"), Err(CommandError::NotFloat)));
        assert!(matches!(parse_float(b"one"), Err(CommandError::NotFloat)));
    }

    #[test]
    fn float_text() {
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(10.5), "10.5");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn float_text_extremes() {
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(1e300), "1e+300");
        assert_eq!(format_float(-1e300), "-1e+300");
        assert_eq!(format_float(1e-300), "1e-300");
        assert_eq!(format_float(2.5e-7), "2.5e-07");
        assert_eq!(format_float(1e17), "1e+17");
        assert_eq!(format_float(1e16), "10000000000000000");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(f64::MAX), "1.7976931348623157e+308");

        for value in [1e300, 1e-300, 2.5e-7, f64::MAX, f64::MIN_POSITIVE] {
            let text = format_float(value);
            assert_eq!(parse_float(&text).unwrap(), value);
        }
    }
}
