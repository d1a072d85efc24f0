use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Money        -----------------------------------------------------------
/// A monetary amount in integer cents.
///
/// All arithmetic is exact fixed-point integer arithmetic. Binary floating point is never used for money anywhere in
/// the workspace, so amounts that reconcile on paper reconcile in the database too.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses decimal currency strings such as `"95.00"`, `"$12.5"` or `"7"`. At most two decimal places are
    /// accepted, since cents are the smallest representable unit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().trim_start_matches('$');
        let err = || MoneyConversionError(format!("'{s}' is not a valid money amount"));
        let (sign, raw) = match raw.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, raw),
        };
        let (whole, frac) = match raw.split_once('.') {
            Some((w, f)) => (w, f),
            None => (raw, ""),
        };
        if frac.len() > 2 {
            return Err(err());
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|_| err())? };
        let mut cents = if frac.is_empty() { 0 } else { frac.parse::<i64>().map_err(|_| err())? };
        if frac.len() == 1 {
            cents *= 10;
        }
        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .and_then(|v| v.checked_mul(sign))
            .map(Self)
            .ok_or_else(err)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units, e.g. `Money::from_whole(45)` is $45.00.
    pub fn from_whole(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

//--------------------------------------    FeePercentage   -----------------------------------------------------------
/// A percentage with two decimal places, stored as integer basis points (5.00% == 500 bp).
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct FeePercentage(i64);

impl Default for FeePercentage {
    /// The platform default commission of 5.00%.
    fn default() -> Self {
        Self(500)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid fee percentage: {0}")]
pub struct FeePercentageError(String);

impl FeePercentage {
    /// One hundred percent, the upper bound for any platform fee.
    pub const MAX: FeePercentage = FeePercentage(10_000);

    pub fn from_basis_points(bp: i64) -> Result<Self, FeePercentageError> {
        if (0..=Self::MAX.0).contains(&bp) {
            Ok(Self(bp))
        } else {
            Err(FeePercentageError(format!("{bp} basis points is outside 0..=100.00%")))
        }
    }

    /// Convenience constructor for whole percentages, e.g. `from_percent(5)` is 5.00%.
    pub fn from_percent(percent: i64) -> Result<Self, FeePercentageError> {
        Self::from_basis_points(percent * 100)
    }

    pub fn basis_points(&self) -> i64 {
        self.0
    }
}

impl Display for FeePercentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
