//! # Fixed-Point Decimal
//!
//! Numeric literal values (ratings, fees, ages) and tolerances are compared
//! through `Decimal`, an `i64` counted in millionths. The CORE never touches
//! floating point.

use crate::primitives::{DECIMAL_DIGITS, DECIMAL_SCALE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A signed fixed-point number with six fractional digits.
///
/// Serialized as its textual form (`"4.5"`), so configuration files and rule
/// files stay human-readable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Decimal(i64);

impl Decimal {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Build from a raw count of millionths.
    #[must_use]
    pub const fn from_millionths(millionths: i64) -> Self {
        Self(millionths)
    }

    /// Build from a whole number, saturating at the representable bounds.
    #[must_use]
    pub const fn from_int(value: i64) -> Self {
        Self(value.saturating_mul(DECIMAL_SCALE))
    }

    /// Raw millionths.
    #[must_use]
    pub const fn millionths(self) -> i64 {
        self.0
    }

    /// Absolute difference, saturating.
    #[must_use]
    pub const fn abs_diff(self, other: Self) -> Self {
        let diff = self.0.abs_diff(other.0);
        if diff > i64::MAX as u64 {
            Self(i64::MAX)
        } else {
            Self(diff as i64)
        }
    }

    /// Parse an `xsd:integer`, `xsd:decimal` or `xsd:double` lexical form.
    ///
    /// Digits beyond the sixth fractional place are truncated. Returns `None`
    /// for anything that is not a finite number in range.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::parse_digits(text, false)
    }

    /// Like [`Decimal::parse`], but `None` when a non-zero digit would be
    /// dropped. Literal values go through this so that `5.0000001` is never
    /// read as `5.0`.
    #[must_use]
    pub fn parse_exact(text: &str) -> Option<Self> {
        Self::parse_digits(text, true)
    }

    fn parse_digits(text: &str, exact: bool) -> Option<Self> {
        let text = text.trim();
        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(idx) => (&text[..idx], text[idx + 1..].parse::<i32>().ok()?),
            None => (text, 0),
        };

        let (negative, unsigned) = match mantissa.as_bytes().first()? {
            b'-' => (true, &mantissa[1..]),
            b'+' => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let frac_len = i32::try_from(frac_part.len()).ok()?;
        let mut shift = exponent
            .checked_sub(frac_len)?
            .checked_add(DECIMAL_DIGITS as i32)?;

        let mut digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();
        if shift < 0 {
            let drop = usize::try_from(shift.unsigned_abs()).ok()?.min(digits.len());
            let kept = digits.len() - drop;
            if exact && digits[kept..].iter().any(|&d| d != 0) {
                return None;
            }
            digits.truncate(kept);
            shift = 0;
        }

        let mut value: i64 = 0;
        for digit in digits {
            value = value.checked_mul(10)?.checked_add(i64::from(digit))?;
        }
        if value != 0 {
            value = value.checked_mul(10_i64.checked_pow(shift.unsigned_abs())?)?;
        }

        Some(Self(if negative { -value } else { value }))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = DECIMAL_SCALE.unsigned_abs();
        let whole = abs / scale;
        let frac = abs % scale;
        if frac == 0 {
            return write!(f, "{sign}{whole}.0");
        }
        let frac = format!("{frac:06}");
        write!(f, "{sign}{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl FromStr for Decimal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a decimal number: '{s}'"))
    }
}

impl TryFrom<String> for Decimal {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Decimal> for String {
    fn from(value: Decimal) -> Self {
        value.to_string()
    }
}
