use anyhow::{bail, Context};
use serde::{Serialize, Serializer};
use serde_with::DeserializeFromStr;

use std::{
    fmt::{Debug, Display},
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
};

const SCALE: i64 = 1_000_000;
const SCALE_DIGITS: usize = 6;

/// Represents a sales amount.
///
/// The amount is stored internally as an integer number of millionths, so
/// that sums are exact and do not depend on the order of addition. The
/// [`Display`] implementation formats it to 2 decimal places.
///
/// Serialization writes the exact value, without rounding.
#[derive(Clone, Copy, Default, DeserializeFromStr, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Amount(i64);

impl Amount {
    /// Returns the amount as a floating-point number, for plotting.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Formats the exact value, with at least 2 and at most 6 decimal places.
    #[must_use]
    pub fn to_exact_string(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE.unsigned_abs();
        let mut frac = format!("{:06}", abs % scale);
        while frac.len() > 2 && frac.ends_with('0') {
            frac.pop();
        }
        format!("{sign}{}.{frac}", abs / scale)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_exact_string())
    }
}

impl Debug for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Round to cents, half away from zero.
        let half = SCALE / 200;
        let cents = if self.0 < 0 {
            (self.0 - half) / (SCALE / 100)
        } else {
            (self.0 + half) / (SCALE / 100)
        };
        let sign = if cents < 0 { "-" } else { "" };
        let cents = cents.unsigned_abs();
        let text = format!("{sign}{}.{:02}", cents / 100, cents % 100);
        f.pad(&text)
    }
}

impl FromStr for Amount {
    type Err = anyhow::Error;

    /// Parses a decimal amount such as `1,234.5`, `-3.25` or `$19.99`.
    ///
    /// A blank string parses as zero.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let rest = rest.strip_prefix('$').unwrap_or(rest).replace(',', "");
        let (whole, frac) = rest.split_once('.').unwrap_or((rest.as_str(), ""));
        if whole.is_empty() && frac.is_empty() {
            bail!("invalid amount {s:?}");
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            bail!("invalid amount {s:?}");
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .with_context(|| format!("invalid amount {s:?}"))?
        };
        let mut digits: String = frac.chars().take(SCALE_DIGITS).collect();
        while digits.len() < SCALE_DIGITS {
            digits.push('0');
        }
        let mut fraction: i64 = digits.parse()?;
        if frac.as_bytes().get(SCALE_DIGITS).is_some_and(|d| *d >= b'5') {
            fraction += 1;
        }
        let value = whole
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(fraction))
            .with_context(|| format!("amount out of range {s:?}"))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Amount {
        fn from_millionths(millionths: i64) -> Self {
            Self(millionths)
        }
    }

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    #[test]
    fn from_str_fn_parses_plain_and_decorated_amounts() {
        assert_eq!(amount("100"), Amount::from_millionths(100_000_000));
        assert_eq!(amount("221.98"), Amount::from_millionths(221_980_000));
        assert_eq!(amount("3709.395"), Amount::from_millionths(3_709_395_000));
        assert_eq!(amount("$1,234.50"), Amount::from_millionths(1_234_500_000));
        assert_eq!(amount("-3.25"), Amount::from_millionths(-3_250_000));
        assert_eq!(amount(".5"), Amount::from_millionths(500_000));
    }

    #[test]
    fn from_str_fn_rounds_digits_past_the_sixth() {
        assert_eq!(amount("0.0000005"), Amount::from_millionths(1));
        assert_eq!(amount("0.0000004"), Amount::from_millionths(0));
    }

    #[test]
    fn from_str_fn_treats_blank_as_zero() {
        assert_eq!(amount("  "), Amount::default());
    }

    #[test]
    fn from_str_fn_rejects_non_numeric_text() {
        assert!(Amount::from_str("abc").is_err());
        assert!(Amount::from_str("12a").is_err());
        assert!(Amount::from_str("1.2.3").is_err());
        assert!(Amount::from_str("-").is_err());
    }

    #[test]
    fn display_fn_rounds_to_cents() {
        assert_eq!(amount("3709.395").to_string(), "3709.40");
        assert_eq!(amount("-0.004").to_string(), "0.00");
        assert_eq!(amount("-12.5").to_string(), "-12.50");
        assert_eq!(format!("{:>8}", amount("1.5")), "    1.50");
    }

    #[test]
    fn to_exact_string_fn_keeps_every_digit() {
        assert_eq!(amount("3709.395").to_exact_string(), "3709.395");
        assert_eq!(amount("100").to_exact_string(), "100.00");
        assert_eq!(amount("-0.000001").to_exact_string(), "-0.000001");
        assert_eq!(amount("12.5").to_exact_string(), "12.50");
    }

    #[test]
    fn sum_is_exact() {
        let parts = ["0.1", "0.2", "0.3"].map(amount);
        assert_eq!(parts.iter().sum::<Amount>(), amount("0.6"));
    }
}
