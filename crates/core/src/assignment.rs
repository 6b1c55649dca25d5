#![forbid(unsafe_code)]

//! Completion and approval state machine.
//!
//! Every transition is a pure function from the current record to the next
//! one; persistence and authorization live in the storage layer. Rejection is
//! the `completed -> available` edge and leaves `rejection_reason` behind, so
//! no record is ever stored in a separate "rejected" state.

use crate::error::{TransitionError, ValidationError};
use crate::ids::{AssignmentId, MemberId, TemplateId};
use crate::money::Money;
use crate::recurrence::{Gate, Recurrence, recurrence_gate};
use crate::reward::RewardPolicy;
use crate::template::Slot;
use serde::{Deserialize, Serialize};

pub const MAX_REJECTION_REASON_LEN: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignmentState {
    Available,
    Completed,
    Approved,
}

impl AssignmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Completed => "completed",
            Self::Approved => "approved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Self::Available),
            "completed" => Some(Self::Completed),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub template_id: TemplateId,
    pub slot: Slot,
    pub assignee_id: Option<MemberId>,
    pub state: AssignmentState,
    pub round: u32,
    pub revision: i64,
    pub completed_at_ms: Option<i64>,
    pub approved_at_ms: Option<i64>,
    pub approved_reward: Option<Money>,
    pub rejection_reason: Option<String>,
    pub next_available_at_ms: Option<i64>,
}

impl Assignment {
    /// A fresh `available` record for an eagerly materialized slot.
    pub fn new_available(id: AssignmentId, template_id: TemplateId, slot: Slot) -> Self {
        let assignee_id = match &slot {
            Slot::Member(member) => Some(member.clone()),
            Slot::Pool => None,
        };
        Self {
            id,
            template_id,
            slot,
            assignee_id,
            state: AssignmentState::Available,
            round: 1,
            revision: 1,
            completed_at_ms: None,
            approved_at_ms: None,
            approved_reward: None,
            rejection_reason: None,
            next_available_at_ms: None,
        }
    }

    pub fn is_pool(&self) -> bool {
        self.slot.is_pool()
    }

    /// Holds the template's pool round: claimed and either awaiting review or
    /// approved and not yet reopened.
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            AssignmentState::Completed | AssignmentState::Approved
        )
    }

    pub fn was_rejected(&self) -> bool {
        self.state == AssignmentState::Available && self.rejection_reason.is_some()
    }

    pub fn gate(&self, recurrence: &Recurrence, now_ms: i64) -> Gate {
        if self.state != AssignmentState::Approved {
            return Gate::Open;
        }
        recurrence_gate(self.approved_at_ms, recurrence.cooldown_days(), now_ms)
    }

    pub fn needs_reset(&self, recurrence: &Recurrence, now_ms: i64) -> bool {
        self.state == AssignmentState::Approved && self.gate(recurrence, now_ms) == Gate::Open
    }

    /// The record as of `now_ms`: an approved recurring assignment whose
    /// cooldown has elapsed is back in `available` for a new round, and a
    /// pool assignment additionally returns to the pool.
    pub fn refreshed(&self, recurrence: &Recurrence, now_ms: i64) -> Assignment {
        if !self.needs_reset(recurrence, now_ms) {
            return self.clone();
        }
        let mut next = self.clone();
        next.state = AssignmentState::Available;
        next.round = self.round.saturating_add(1);
        next.completed_at_ms = None;
        next.approved_at_ms = None;
        next.approved_reward = None;
        next.rejection_reason = None;
        next.next_available_at_ms = None;
        if self.is_pool() {
            next.assignee_id = None;
        }
        next
    }

    pub fn is_available_to(&self, member: &MemberId, recurrence: &Recurrence, now_ms: i64) -> bool {
        let current = self.refreshed(recurrence, now_ms);
        if current.state != AssignmentState::Available {
            return false;
        }
        match &current.assignee_id {
            Some(assignee) => assignee == member,
            None => current.is_pool(),
        }
    }

    /// `available -> completed`. An unowned pool record is claimed by `actor`.
    pub fn complete(
        &self,
        actor: &MemberId,
        recurrence: &Recurrence,
        now_ms: i64,
    ) -> Result<Assignment, TransitionError> {
        let current = self.refreshed(recurrence, now_ms);
        match current.state {
            AssignmentState::Available => {}
            AssignmentState::Approved => {
                return Err(match current.gate(recurrence, now_ms) {
                    Gate::CoolingDown { until_ms } => TransitionError::CoolingDown { until_ms },
                    Gate::Closed | Gate::Open => TransitionError::AlreadyApproved,
                });
            }
            actual => {
                return Err(TransitionError::WrongState {
                    expected: AssignmentState::Available,
                    actual,
                });
            }
        }
        match &current.assignee_id {
            Some(assignee) if assignee != actor => return Err(TransitionError::NotAssignee),
            Some(_) => {}
            None if current.is_pool() => {}
            None => return Err(TransitionError::NotAssignee),
        }

        let mut next = current;
        next.assignee_id = Some(actor.clone());
        next.state = AssignmentState::Completed;
        next.completed_at_ms = Some(now_ms);
        next.rejection_reason = None;
        Ok(next)
    }

    /// `completed -> approved`, resolving the payable reward.
    pub fn approve(
        &self,
        reward: &RewardPolicy,
        recurrence: &Recurrence,
        chosen_reward: Option<Money>,
        now_ms: i64,
    ) -> Result<(Assignment, Money), TransitionError> {
        let current = self.refreshed(recurrence, now_ms);
        if current.state != AssignmentState::Completed {
            return Err(TransitionError::WrongState {
                expected: AssignmentState::Completed,
                actual: current.state,
            });
        }
        let amount = reward.resolve(chosen_reward)?;

        let mut next = current;
        next.state = AssignmentState::Approved;
        next.approved_at_ms = Some(now_ms);
        next.approved_reward = Some(amount);
        next.next_available_at_ms = recurrence.next_available_at(now_ms);
        Ok((next, amount))
    }

    /// `completed -> available` with a reason; pool records go back to the pool.
    pub fn reject(&self, reason: &str) -> Result<Assignment, TransitionError> {
        let reason = validate_rejection_reason(reason)?;
        if self.state != AssignmentState::Completed {
            return Err(TransitionError::WrongState {
                expected: AssignmentState::Completed,
                actual: self.state,
            });
        }

        let mut next = self.clone();
        next.state = AssignmentState::Available;
        next.rejection_reason = Some(reason);
        next.completed_at_ms = None;
        next.approved_at_ms = None;
        next.approved_reward = None;
        next.next_available_at_ms = None;
        if self.is_pool() {
            next.assignee_id = None;
        }
        Ok(next)
    }
}

pub fn validate_rejection_reason(reason: &str) -> Result<String, ValidationError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("reason", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_REJECTION_REASON_LEN {
        return Err(ValidationError::new(
            "reason",
            format!("must be at most {MAX_REJECTION_REASON_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests;
