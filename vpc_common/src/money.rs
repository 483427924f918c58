use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY: &str = "USD";

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount in minor units (cents). All balances and payout amounts in the engine are expressed in `Money`,
/// so arithmetic is exact and the database stores a plain integer column.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
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
        let cents = self.0.abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from_cents(500_000).to_string(), "5000.00");
        assert_eq!(Money::from_cents(105).to_string(), "1.05");
        assert_eq!(Money::from_cents(-250).to_string(), "-2.50");
        assert_eq!(Money::default().to_string(), "0.00");
    }

    #[test]
    fn arithmetic_is_exact() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);
        assert_eq!(a - b, Money::from_cents(750));
        assert_eq!(a + b, Money::from_cents(1250));
        assert_eq!(-b, Money::from_cents(-250));
        let mut c = a;
        c -= b;
        assert_eq!(c, Money::from_cents(750));
        assert_eq!(vec![a, b].into_iter().sum::<Money>(), Money::from_cents(1250));
    }

    #[test]
    fn conversion_bounds() {
        assert!(Money::try_from(u64::MAX).is_err());
        assert_eq!(Money::try_from(42u64).unwrap(), Money::from_cents(42));
    }
}
