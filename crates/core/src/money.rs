#![forbid(unsafe_code)]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fractional digits kept for every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// A currency amount with exactly [`MONEY_SCALE`] fractional digits.
///
/// Amounts carrying more precision are rejected instead of rounded. The value
/// may be negative (adjustments, balances); call sites that need a
/// non-negative amount check it explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub fn zero() -> Self {
        Self::from_cents(0)
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    pub fn try_new(value: Decimal) -> Result<Self, MoneyError> {
        if value.normalize().scale() > MONEY_SCALE {
            return Err(MoneyError::TooPrecise);
        }
        let mut value = value;
        value.rescale(MONEY_SCALE);
        Ok(Self(value))
    }

    pub fn parse(value: &str) -> Result<Self, MoneyError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MoneyError::Invalid);
        }
        let decimal = Decimal::from_str(trimmed).map_err(|_| MoneyError::Invalid)?;
        Self::try_new(decimal)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("amount is not a decimal number")]
    Invalid,
    #[error("amount must have at most {scale} fractional digits", scale = MONEY_SCALE)]
    TooPrecise,
    #[error("amount is out of range")]
    Overflow,
}

/// Sums amounts without silently wrapping.
pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Money>) -> Result<Money, MoneyError> {
    amounts
        .into_iter()
        .try_fold(Money::zero(), |acc, amount| {
            acc.checked_add(*amount).ok_or(MoneyError::Overflow)
        })
}
