use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Largest decimal exponent accepted when parsing.
const MAX_EXPONENT: u64 = 1_000_000;

/// Fractional digits rendered for numbers without a finite decimal
/// expansion, on top of the digits needed to reach the first significant one.
const REPEATING_DIGITS: usize = 40;

/// An exact arbitrary-precision number.
///
/// Literals, arithmetic other than division, and conversions from strings
/// are exact. Division is exact too; only rendering a quotient with no
/// finite decimal expansion rounds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Number(BigRational);

impl Number {
    /// Parses decimal notation with an optional sign, fraction and exponent.
    pub fn parse(text: &str) -> Option<Number> {
        let text = text.trim();
        let (negative, rest) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(at) => (&rest[..at], parse_exponent(&rest[at + 1..])?),
            None => (rest, 0),
        };
        let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let digits = BigInt::from_str(&format!("{whole}{fraction}")).ok()?;
        let scale = exponent.checked_sub(i64::try_from(fraction.len()).ok()?)?;
        if scale.unsigned_abs() > MAX_EXPONENT {
            return None;
        }
        let shift = pow10(usize::try_from(scale.unsigned_abs()).ok()?);
        let value = if scale >= 0 {
            BigRational::from_integer(digits * shift)
        } else {
            BigRational::new(digits, shift)
        };
        Some(Number(if negative { -value } else { value }))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// The number as a signed integer, if it is a whole number in range.
    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }
        self.0.to_integer().to_i64()
    }

    /// `None` when `rhs` is zero.
    pub fn checked_div(&self, rhs: &Number) -> Option<Number> {
        if rhs.is_zero() {
            return None;
        }
        Some(Number(&self.0 / &rhs.0))
    }

    /// Remainder of truncating division, taking the sign of `self`.
    /// `None` when `rhs` is zero.
    pub fn checked_rem(&self, rhs: &Number) -> Option<Number> {
        if rhs.is_zero() {
            return None;
        }
        let quotient = (&self.0 / &rhs.0).trunc();
        Some(Number(&self.0 - &rhs.0 * quotient))
    }
}

fn parse_exponent(text: &str) -> Option<i64> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn pow10(exponent: usize) -> BigInt {
    num_traits::pow(BigInt::from(10u8), exponent)
}

/// How many times `factor` divides `value`, and what is left over.
fn strip_factor(mut value: BigInt, factor: u8) -> (BigInt, usize) {
    let factor = BigInt::from(factor);
    let mut count = 0;
    while (&value % &factor).is_zero() {
        value /= &factor;
        count += 1;
    }
    (value, count)
}

impl FromStr for Number {
    type Err = ();

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Number::parse(text).ok_or(())
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(BigRational::from_integer(BigInt::from(value)))
    }
}

impl Add for Number {
    type Output = Number;

    fn add(self, rhs: Number) -> Number {
        Number(self.0 + rhs.0)
    }
}

impl Sub for Number {
    type Output = Number;

    fn sub(self, rhs: Number) -> Number {
        Number(self.0 - rhs.0)
    }
}

impl Mul for Number {
    type Output = Number;

    fn mul(self, rhs: Number) -> Number {
        Number(self.0 * rhs.0)
    }
}

impl Neg for Number {
    type Output = Number;

    fn neg(self) -> Number {
        Number(-self.0)
    }
}

impl std::iter::Sum for Number {
    fn sum<I: Iterator<Item = Number>>(iter: I) -> Number {
        iter.fold(Number(BigRational::zero()), Add::add)
    }
}

/// Plain decimal notation with no exponent and no trailing zeros.
impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            return write!(f, "{}", self.0.to_integer());
        }
        let denom = self.0.denom().clone();
        let (rest, twos) = strip_factor(denom.clone(), 2);
        let (rest, fives) = strip_factor(rest, 5);
        let places = if rest.is_one() {
            twos.max(fives)
        } else {
            denom.to_string().len() + REPEATING_DIGITS
        };

        let scaled = (self.0.abs() * BigRational::from_integer(pow10(places))).round();
        let mut digits = scaled.to_integer().to_string();
        if digits.len() <= places {
            digits.insert_str(0, &"0".repeat(places + 1 - digits.len()));
        }
        let (whole, fraction) = digits.split_at(digits.len() - places);
        let fraction = fraction.trim_end_matches('0');
        if self.is_negative() && !scaled.is_zero() {
            f.write_str("-")?;
        }
        if fraction.is_empty() {
            f.write_str(whole)
        } else {
            write!(f, "{whole}.{fraction}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> Number {
        Number::parse(text).unwrap()
    }

    #[test]
    fn parses_decimal_and_exponent_forms() {
        assert_eq!(num("1e3"), Number::from(1000));
        assert_eq!(num("2.5").to_string(), "2.5");
        assert_eq!(num("-0.125E1").to_string(), "-1.25");
        assert_eq!(num(" 12 ").to_string(), "12");
        assert_eq!(Number::parse(""), None);
        assert_eq!(Number::parse("1e"), None);
        assert_eq!(Number::parse("."), None);
        assert_eq!(Number::parse("1.2.3"), None);
        assert_eq!(Number::parse("0x10"), None);
    }

    #[test]
    fn holds_values_beyond_machine_precision() {
        let big = num("99999999999999999999999999999");
        assert_eq!((big + Number::from(1)).to_string(), "100000000000000000000000000000");
        assert_eq!(num("1e40").to_string(), format!("1{}", "0".repeat(40)));
        assert_eq!(num("1e-40").to_string(), format!("0.{}1", "0".repeat(39)));
        assert_eq!(num("1e400") * num("1e-400"), Number::from(1));
    }

    #[test]
    fn rejects_absurd_exponents() {
        assert_eq!(Number::parse("1e99999999"), None);
    }

    #[test]
    fn repeating_quotients_are_rounded_for_display() {
        let third = Number::from(1).checked_div(&Number::from(3)).unwrap();
        assert_eq!(third.to_string(), format!("0.{}", "3".repeat(41)));
        let two_thirds = Number::from(-2).checked_div(&Number::from(3)).unwrap();
        assert!(two_thirds.to_string().ends_with("67"));
        assert!(two_thirds.to_string().starts_with("-0.666"));
    }

    #[test]
    fn remainder_follows_dividend_sign() {
        let rem = Number::from(-7).checked_rem(&Number::from(3)).unwrap();
        assert_eq!(rem, Number::from(-1));
        let rem = num("5.5").checked_rem(&Number::from(2)).unwrap();
        assert_eq!(rem.to_string(), "1.5");
        assert_eq!(Number::from(1).checked_rem(&Number::from(0)), None);
    }

    #[test]
    fn integer_extraction() {
        assert_eq!(num("4.0").to_i64(), Some(4));
        assert_eq!(num("0.5").to_i64(), None);
        assert_eq!(num("1e30").to_i64(), None);
    }
}
