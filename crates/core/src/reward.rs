#![forbid(unsafe_code)]

use crate::error::ValidationError;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// How much an approval pays out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RewardPolicy {
    Fixed { amount: Money },
    Range { min: Money, max: Money },
}

impl RewardPolicy {
    pub fn fixed(amount: Money) -> Result<Self, ValidationError> {
        let policy = Self::Fixed { amount };
        policy.validate()?;
        Ok(policy)
    }

    pub fn range(min: Money, max: Money) -> Result<Self, ValidationError> {
        let policy = Self::Range { min, max };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Fixed { amount } => {
                if amount.is_negative() {
                    return Err(ValidationError::new(
                        "reward.amount",
                        "must not be negative",
                    ));
                }
            }
            Self::Range { min, max } => {
                if min.is_negative() {
                    return Err(ValidationError::new("reward.min", "must not be negative"));
                }
                if max.is_negative() {
                    return Err(ValidationError::new("reward.max", "must not be negative"));
                }
                if min >= max {
                    return Err(ValidationError::new(
                        "reward.range",
                        format!("min ({min}) must be less than max ({max})"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Inclusive bounds of what an approval may pay.
    pub fn bounds(&self) -> (Money, Money) {
        match self {
            Self::Fixed { amount } => (*amount, *amount),
            Self::Range { min, max } => (*min, *max),
        }
    }

    /// Turns the policy and the approver's optional pick into the payable amount.
    pub fn resolve(&self, chosen: Option<Money>) -> Result<Money, ValidationError> {
        match self {
            Self::Fixed { amount } => match chosen {
                None => Ok(*amount),
                Some(chosen) if chosen == *amount => Ok(*amount),
                Some(chosen) => Err(ValidationError::new(
                    "chosenReward",
                    format!("reward is fixed at {amount}, got {chosen}"),
                )),
            },
            Self::Range { .. } => {
                let (min, max) = self.bounds();
                let Some(chosen) = chosen else {
                    return Err(ValidationError::new(
                        "chosenReward",
                        format!("required for range reward {min}..={max}"),
                    ));
                };
                if chosen < min || chosen > max {
                    return Err(ValidationError::new(
                        "chosenReward",
                        format!("must be between {min} and {max}, got {chosen}"),
                    ));
                }
                Ok(chosen)
            }
        }
    }
}
