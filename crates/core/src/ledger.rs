#![forbid(unsafe_code)]

use crate::error::ValidationError;
use crate::ids::{AssignmentId, MemberId};
use crate::money::{Money, MoneyError, checked_sum};
use serde::{Deserialize, Serialize};

pub const MAX_ADJUSTMENT_REASON_LEN: usize = 500;
pub const MAX_PAYOUT_NOTE_LEN: usize = 500;

/// Written exactly once per approval; never edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEvent {
    pub id: String,
    pub assignee_id: MemberId,
    pub amount: Money,
    pub source_assignment_id: AssignmentId,
    pub round: u32,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub id: String,
    pub child_id: MemberId,
    pub amount: Money,
    pub reason: String,
    pub created_by: MemberId,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: String,
    pub child_id: MemberId,
    pub amount: Money,
    pub note: Option<String>,
    pub created_by: MemberId,
    pub created_at_ms: i64,
}

/// Signed, non-zero amount with a short human reason.
pub fn validate_adjustment(amount: Money, reason: &str) -> Result<String, ValidationError> {
    if amount.is_zero() {
        return Err(ValidationError::new("amount", "must not be zero"));
    }
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("reason", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_ADJUSTMENT_REASON_LEN {
        return Err(ValidationError::new(
            "reason",
            format!("must be at most {MAX_ADJUSTMENT_REASON_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// A payout must be positive and covered by the balance it draws from.
pub fn validate_payout(
    amount: Money,
    available: Money,
    note: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    if amount.is_negative() || amount.is_zero() {
        return Err(ValidationError::new("amount", "must be positive"));
    }
    if amount > available {
        return Err(ValidationError::new(
            "amount",
            format!("exceeds available balance {available}"),
        ));
    }
    let note = note.map(str::trim).filter(|note| !note.is_empty());
    if let Some(note) = note
        && note.chars().count() > MAX_PAYOUT_NOTE_LEN
    {
        return Err(ValidationError::new(
            "note",
            format!("must be at most {MAX_PAYOUT_NOTE_LEN} characters"),
        ));
    }
    Ok(note.map(str::to_string))
}

/// Balance derived from the three append-only logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub rewards: Money,
    pub adjustments: Money,
    pub payouts: Money,
    pub total: Money,
}

impl Balance {
    pub fn from_logs(
        rewards: &[RewardEvent],
        adjustments: &[Adjustment],
        payouts: &[Payout],
    ) -> Result<Balance, MoneyError> {
        let rewards = checked_sum(rewards.iter().map(|event| &event.amount))?;
        let adjustments = checked_sum(adjustments.iter().map(|adjustment| &adjustment.amount))?;
        let payouts = checked_sum(payouts.iter().map(|payout| &payout.amount))?;
        Self::from_sums(rewards, adjustments, payouts)
    }

    pub fn from_sums(rewards: Money, adjustments: Money, payouts: Money) -> Result<Balance, MoneyError> {
        let total = rewards
            .checked_add(adjustments)
            .and_then(|sum| sum.checked_sub(payouts))
            .ok_or(MoneyError::Overflow)?;
        Ok(Balance {
            rewards,
            adjustments,
            payouts,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> MemberId {
        MemberId::try_new(id).unwrap()
    }

    fn reward(cents: i64) -> RewardEvent {
        RewardEvent {
            id: "RWD-0001".to_string(),
            assignee_id: member("ann"),
            amount: Money::from_cents(cents),
            source_assignment_id: AssignmentId::try_new("ASN-0001").unwrap(),
            round: 1,
            created_at_ms: 0,
        }
    }

    fn adjustment(cents: i64) -> Adjustment {
        Adjustment {
            id: "ADJ-0001".to_string(),
            child_id: member("ann"),
            amount: Money::from_cents(cents),
            reason: "birthday".to_string(),
            created_by: member("mom"),
            created_at_ms: 0,
        }
    }

    fn payout(cents: i64) -> Payout {
        Payout {
            id: "PAY-0001".to_string(),
            child_id: member("ann"),
            amount: Money::from_cents(cents),
            note: None,
            created_by: member("mom"),
            created_at_ms: 0,
        }
    }

    #[test]
    fn balance_is_rewards_plus_adjustments_minus_payouts() {
        let balance = Balance::from_logs(
            &[reward(100), reward(700)],
            &[adjustment(250), adjustment(-50)],
            &[payout(300)],
        )
        .unwrap();
        assert_eq!(balance.rewards, Money::from_cents(800));
        assert_eq!(balance.adjustments, Money::from_cents(200));
        assert_eq!(balance.payouts, Money::from_cents(300));
        assert_eq!(balance.total, Money::from_cents(700));
    }

    #[test]
    fn empty_logs_balance_to_zero() {
        let balance = Balance::from_logs(&[], &[], &[]).unwrap();
        assert_eq!(balance.total, Money::zero());
    }

    #[test]
    fn adjustment_validation() {
        assert_eq!(
            validate_adjustment(Money::zero(), "oops").unwrap_err().field,
            "amount"
        );
        assert_eq!(
            validate_adjustment(Money::from_cents(-100), " ").unwrap_err().field,
            "reason"
        );
        assert!(
            validate_adjustment(
                Money::from_cents(100),
                &"x".repeat(MAX_ADJUSTMENT_REASON_LEN + 1)
            )
            .is_err()
        );
        assert_eq!(
            validate_adjustment(Money::from_cents(-100), " broke a window ").unwrap(),
            "broke a window"
        );
    }

    #[test]
    fn payout_must_be_covered() {
        let available = Money::from_cents(500);
        assert!(validate_payout(Money::zero(), available, None).is_err());
        assert!(validate_payout(Money::from_cents(-1), available, None).is_err());
        assert_eq!(
            validate_payout(Money::from_cents(501), available, None)
                .unwrap_err()
                .constraint,
            "exceeds available balance 5.00"
        );
        assert_eq!(
            validate_payout(Money::from_cents(500), available, Some("  ")).unwrap(),
            None
        );
    }
}
