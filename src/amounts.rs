use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

const TINYBAR_SCALE: u32 = 8;

/// Scales a raw token amount by its decimals and renders exactly `decimals` fraction digits.
/// `factor` flips the sign for debit display.
pub fn apply_decimals(amount: impl Into<i128>, decimals: u32, factor: i64) -> String {
    let raw = amount.into() * i128::from(factor);
    match Decimal::try_from_i128_with_scale(raw, decimals) {
        Ok(scaled) => scaled.to_string(),
        // scale past what Decimal can carry; fall back to an exact string shift
        Err(_) => shift_decimal_point(raw, decimals),
    }
}

fn shift_decimal_point(raw: i128, decimals: u32) -> String {
    let sign = if raw < 0 { "-" } else { "" };
    let digits = format!("{:0>width$}", raw.unsigned_abs(), width = decimals as usize + 1);
    let (int, frac) = digits.split_at(digits.len() - decimals as usize);
    if frac.is_empty() {
        format!("{sign}{int}")
    } else {
        format!("{sign}{int}.{frac}")
    }
}

pub fn tiny_to_hbar(amount: i64) -> Decimal {
    Decimal::new(amount, TINYBAR_SCALE)
}

/// Formats to `precision` significant digits, switching to exponent notation
/// below 1e-6 or at and above 10^precision.
pub fn to_precision(value: Decimal, precision: u32) -> String {
    let precision = precision.max(1);
    if value.is_zero() {
        return format!("{:.*}", precision as usize - 1, Decimal::ZERO);
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    let magnitude = value.abs();
    let mut exponent = decimal_exponent(magnitude);
    let mut rounded = round_significant(magnitude, exponent, precision);
    let bumped = decimal_exponent(rounded);
    if bumped != exponent {
        exponent = bumped;
        rounded = round_significant(magnitude, exponent, precision);
    }

    if exponent < -6 || exponent >= precision as i32 {
        let mantissa = rounded / pow10(exponent);
        let mantissa = mantissa.round_dp_with_strategy(precision - 1, RoundingStrategy::MidpointAwayFromZero);
        let exp_sign = if exponent < 0 { "-" } else { "+" };
        if precision == 1 {
            return format!("{sign}{}e{exp_sign}{}", mantissa.trunc(), exponent.abs());
        }
        return format!(
            "{sign}{:.*}e{exp_sign}{}",
            precision as usize - 1,
            mantissa,
            exponent.abs()
        );
    }

    let fraction_digits = (precision as i32 - 1 - exponent).max(0) as usize;
    format!("{sign}{:.*}", fraction_digits, rounded)
}

fn decimal_exponent(value: Decimal) -> i32 {
    // digits in the integer part, or leading zeros after the point
    let int_part = value.trunc();
    if !int_part.is_zero() {
        return int_part.to_string().trim_start_matches('-').len() as i32 - 1;
    }
    let mut exponent = -1;
    let mut probe = value;
    while probe < Decimal::ONE && exponent > -28 {
        probe *= Decimal::TEN;
        if probe >= Decimal::ONE {
            break;
        }
        exponent -= 1;
    }
    exponent
}

fn round_significant(value: Decimal, exponent: i32, precision: u32) -> Decimal {
    let dp = precision as i32 - 1 - exponent;
    if dp >= 0 {
        value.round_dp_with_strategy(dp as u32, RoundingStrategy::MidpointAwayFromZero)
    } else {
        let unit = pow10(-dp);
        (value / unit).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * unit
    }
}

fn pow10(exponent: i32) -> Decimal {
    let mut out = Decimal::ONE;
    for _ in 0..exponent.unsigned_abs() {
        if exponent >= 0 {
            out *= Decimal::TEN;
        } else {
            out /= Decimal::TEN;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn applies_exact_decimals() {
        assert_eq!(apply_decimals(1500, 3, 1), "1.500");
        assert_eq!(apply_decimals(-1500, 3, -1), "1.500");
        assert_eq!(apply_decimals(7, 0, 1), "7");
        assert_eq!(apply_decimals(5, 4, 1), "0.0005");
    }

    #[test]
    fn shifts_when_scale_exceeds_decimal() {
        assert_eq!(apply_decimals(12, 30, 1), "0.000000000000000000000000000012");
    }

    #[test]
    fn tinybar_conversion() {
        assert_eq!(tiny_to_hbar(-2_000_000_000), Decimal::from(-20));
        assert_eq!(tiny_to_hbar(1), Decimal::from_str("0.00000001").unwrap());
    }

    #[test]
    fn eight_significant_digits() {
        assert_eq!(to_precision(Decimal::from_str("12.5").unwrap(), 8), "12.500000");
        assert_eq!(to_precision(Decimal::from(20), 8), "20.000000");
        assert_eq!(to_precision(Decimal::from_str("0.001").unwrap(), 8), "0.0010000000");
        assert_eq!(to_precision(Decimal::from_str("-3.14159265358").unwrap(), 8), "-3.1415927");
        assert_eq!(to_precision(Decimal::ZERO, 8), "0.0000000");
    }

    #[test]
    fn rounding_can_carry_into_next_digit() {
        assert_eq!(to_precision(Decimal::from_str("9.999999999").unwrap(), 8), "10.000000");
    }

    #[test]
    fn large_values_use_exponent_notation() {
        assert_eq!(to_precision(Decimal::from(123_456_789), 8), "1.2345679e+8");
        assert_eq!(to_precision(Decimal::from_str("0.00000001").unwrap(), 8), "1.0000000e-8");
    }
}
