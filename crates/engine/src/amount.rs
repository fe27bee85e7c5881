//! Fixed-point amounts stored as integer hundredths.
//!
//! Money is stored in **minor units** (`1050` = `10.50`) and loyalty points
//! are stored ×100 (`4575` = `45.75 pts`). Both share the same parsing rules,
//! so operator input never goes through floating point.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Signed money amount represented as **integer minor units**.
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10,5".parse::<Money>().unwrap().minor(), 1050);
/// assert_eq!(Money::new(-1050).to_string(), "-10.50");
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hundredths(f, self.0)
    }
}

impl FromStr for Money {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths(s).map(Money)
    }
}

/// Loyalty points stored ×100.
///
/// ```rust
/// use engine::Points;
///
/// assert_eq!(Points::new(4575).to_string(), "45.75 pts");
/// assert_eq!(Points::new(10000).to_string(), "100 pts");
/// assert_eq!("45.75".parse::<Points>().unwrap().stored(), 4575);
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Points(i64);

impl Points {
    pub const ZERO: Points = Points(0);

    #[must_use]
    pub const fn new(stored: i64) -> Self {
        Self(stored)
    }

    /// Returns the stored (×100) value.
    #[must_use]
    pub const fn stored(self) -> i64 {
        self.0
    }

    /// Checked addition, `Validation` on overflow.
    pub fn checked_add(self, rhs: Points) -> Result<Points, EngineError> {
        self.0
            .checked_add(rhs.0)
            .map(Points)
            .ok_or_else(|| EngineError::Validation("amount too large".to_string()))
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{} pts", self.0 / 100)
        } else {
            write_hundredths(f, self.0)?;
            write!(f, " pts")
        }
    }
}

impl FromStr for Points {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix("pts").unwrap_or(trimmed);
        parse_hundredths(trimmed).map(Points)
    }
}

fn write_hundredths(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parses a decimal string into hundredths.
///
/// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`;
/// rejects more than 2 fractional digits.
fn parse_hundredths(s: &str) -> Result<i64, EngineError> {
    let empty = || EngineError::Validation("empty amount".to_string());
    let invalid = || EngineError::Validation("invalid amount".to_string());
    let overflow = || EngineError::Validation("amount too large".to_string());

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let rest = rest.replace(',', ".");
    let mut parts = rest.split('.');
    let whole_str = parts.next().ok_or_else(invalid)?;
    let frac_str = parts.next();

    if parts.next().is_some() {
        return Err(invalid());
    }

    if whole_str.is_empty() || !whole_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = whole_str.parse().map_err(|_| invalid())?;

    let frac: i64 = match frac_str {
        None | Some("") => 0,
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            match frac.len() {
                1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                2 => frac.parse::<i64>().map_err(|_| invalid())?,
                _ => return Err(EngineError::Validation("too many decimals".to_string())),
            }
        }
    };

    let total = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(overflow)?;

    if negative {
        total.checked_neg().ok_or_else(overflow)
    } else {
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::new(0).to_string(), "0.00");
        assert_eq!(Money::new(1).to_string(), "0.01");
        assert_eq!(Money::new(1050).to_string(), "10.50");
        assert_eq!(Money::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn display_formats_points() {
        assert_eq!(Points::new(4575).to_string(), "45.75 pts");
        assert_eq!(Points::new(10000).to_string(), "100 pts");
        assert_eq!(Points::new(0).to_string(), "0 pts");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Money>().unwrap().minor(), 1000);
        assert_eq!("10.5".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("10,50".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("-0.01".parse::<Money>().unwrap().minor(), -1);
        assert_eq!("  2.30 ".parse::<Money>().unwrap().minor(), 230);
        assert_eq!("0.01 pts".parse::<Points>().unwrap().stored(), 1);
    }

    #[test]
    fn points_addition_refuses_overflow() {
        assert_eq!(
            Points::new(150).checked_add(Points::new(-50)).unwrap(),
            Points::new(100)
        );
        assert_eq!(
            Points::new(i64::MAX).checked_add(Points::new(1)),
            Err(EngineError::Validation("amount too large".to_string()))
        );
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<Money>().is_err());
        assert!("0.001".parse::<Points>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
    }
}
