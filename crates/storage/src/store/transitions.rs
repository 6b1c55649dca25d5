#![forbid(unsafe_code)]

//! Completion, approval and rejection, one transaction per assignment.

use super::assignments::{insert_assignment_tx, store_assignment_tx};
use super::members::{require_actor, require_member};
use super::rows::{StoredAssignment, load_assignment, load_live_slot, load_template};
use super::templates::next_assignment_id;
use super::{
    Approval, ApproveManyRequest, ApproveRequest, BulkOutcome, CompleteRequest, CompleteTarget,
    RejectManyRequest, RejectRequest, SqliteStore, StoreError, next_id_tx,
};
use cb_core::{
    Assignment, AssignmentId, AssignmentState, ChoreTemplate, Gate, MemberId, Membership,
    RewardEvent, Slot, TransitionError, ValidationError,
};
use rusqlite::{Transaction, params};
use tracing::{debug, info, warn};

impl SqliteStore {
    /// `available -> completed`. For pool chores the first completer claims
    /// the template's single pool assignment; every other concurrent claim
    /// fails with `StoreError::Conflict`.
    pub fn complete(&mut self, request: CompleteRequest) -> Result<Assignment, StoreError> {
        let tx = self.write_tx()?;
        let actor = require_actor(&tx, &request.actor_id)?;

        let completed = match &request.target {
            CompleteTarget::Assignment(id) => {
                let stored = load_assignment(&tx, id)?;
                let template = load_template(&tx, &stored.assignment.template_id)?;
                ensure_completable(&actor, &template)?;
                if stored.is_retired() {
                    return Err(StoreError::state(format!(
                        "assignment {id} was removed from its template"
                    )));
                }
                if stored.assignment.is_pool() {
                    claim_pool_tx(&tx, &actor, &template, Some(stored), request.completed_at_ms)?
                } else {
                    complete_owned_tx(&tx, &actor, &template, stored, request.completed_at_ms)?
                }
            }
            CompleteTarget::PoolTemplate(template_id) => {
                let template = load_template(&tx, template_id)?;
                if !template.assignment_mode.is_pool() {
                    return Err(ValidationError::new(
                        "templateId",
                        format!(
                            "template {template_id} is a {} chore; complete its assignment instead",
                            template.assignment_mode.name()
                        ),
                    )
                    .into());
                }
                ensure_completable(&actor, &template)?;
                claim_pool_tx(&tx, &actor, &template, None, request.completed_at_ms)?
            }
        };

        tx.commit()?;
        info!(
            assignment = %completed.id,
            template = %completed.template_id,
            actor = %actor.member_id,
            round = completed.round,
            "assignment completed"
        );
        Ok(completed)
    }

    /// `completed -> approved`. Resolves the reward and appends exactly one
    /// reward event for the assignment's current round.
    pub fn approve(&mut self, request: ApproveRequest) -> Result<Approval, StoreError> {
        let tx = self.write_tx()?;
        let (stored, template) = load_for_review(&tx, &request.actor_id, &request.assignment_id)?;
        let current = stored.assignment;

        let (mut next, amount) = current
            .approve(
                &template.reward,
                &template.recurrence,
                request.chosen_reward,
                request.approved_at_ms,
            )
            .map_err(|err| review_error(err, &current))?;
        store_assignment_tx(&tx, current.revision, &mut next, request.approved_at_ms)?;

        let Some(assignee_id) = next.assignee_id.clone() else {
            return Err(StoreError::Corrupt("completed assignment without assignee"));
        };
        let reward_event = RewardEvent {
            id: next_id_tx(&tx, "reward_event", "RWD")?,
            assignee_id,
            amount,
            source_assignment_id: next.id.clone(),
            round: next.round,
            created_at_ms: request.approved_at_ms,
        };
        insert_reward_event_tx(&tx, &reward_event)?;

        tx.commit()?;
        info!(
            assignment = %next.id,
            assignee = %reward_event.assignee_id,
            amount = %amount,
            round = next.round,
            "assignment approved"
        );
        Ok(Approval {
            assignment: next,
            reward_event,
        })
    }

    /// `completed -> available` with a reason the assignee will see.
    pub fn reject(&mut self, request: RejectRequest) -> Result<Assignment, StoreError> {
        let tx = self.write_tx()?;
        let (stored, _template) = load_for_review(&tx, &request.actor_id, &request.assignment_id)?;
        let current = stored.assignment;

        let mut next = current
            .reject(&request.reason)
            .map_err(|err| review_error(err, &current))?;
        store_assignment_tx(&tx, current.revision, &mut next, request.rejected_at_ms)?;

        tx.commit()?;
        info!(
            assignment = %next.id,
            returned_to_pool = next.is_pool(),
            "assignment rejected"
        );
        Ok(next)
    }

    /// Approves each item in its own transaction; one failure never undoes
    /// or blocks the others.
    pub fn approve_many(&mut self, request: ApproveManyRequest) -> Vec<BulkOutcome<Approval>> {
        let mut outcomes = Vec::with_capacity(request.items.len());
        for item in request.items {
            let result = self.approve(ApproveRequest {
                actor_id: request.actor_id.clone(),
                assignment_id: item.assignment_id.clone(),
                chosen_reward: item.chosen_reward,
                approved_at_ms: request.approved_at_ms,
            });
            if let Err(err) = &result {
                debug!(assignment = %item.assignment_id, code = err.code(), "bulk approve item failed");
            }
            outcomes.push(BulkOutcome {
                assignment_id: item.assignment_id,
                result,
            });
        }
        outcomes
    }

    pub fn reject_many(&mut self, request: RejectManyRequest) -> Vec<BulkOutcome<Assignment>> {
        let mut outcomes = Vec::with_capacity(request.assignment_ids.len());
        for assignment_id in request.assignment_ids {
            let result = self.reject(RejectRequest {
                actor_id: request.actor_id.clone(),
                assignment_id: assignment_id.clone(),
                reason: request.reason.clone(),
                rejected_at_ms: request.rejected_at_ms,
            });
            if let Err(err) = &result {
                debug!(assignment = %assignment_id, code = err.code(), "bulk reject item failed");
            }
            outcomes.push(BulkOutcome {
                assignment_id,
                result,
            });
        }
        outcomes
    }
}

fn ensure_completable(actor: &Membership, template: &ChoreTemplate) -> Result<(), StoreError> {
    if !actor.in_family(&template.family_id) {
        return Err(StoreError::unauthorized(format!(
            "{} is not a member of family {}",
            actor.member_id, template.family_id
        )));
    }
    if !template.enabled {
        return Err(StoreError::state(format!(
            "template {} is disabled",
            template.id
        )));
    }
    Ok(())
}

fn complete_owned_tx(
    tx: &Transaction<'_>,
    actor: &Membership,
    template: &ChoreTemplate,
    stored: StoredAssignment,
    now_ms: i64,
) -> Result<Assignment, StoreError> {
    let current = stored.assignment;
    let mut next = current.complete(&actor.member_id, &template.recurrence, now_ms)?;
    if next.round != current.round {
        debug!(assignment = %current.id, round = next.round, "cooldown elapsed; new round");
    }
    store_assignment_tx(tx, current.revision, &mut next, now_ms)?;
    Ok(next)
}

/// Claims the template's pool round for `actor`. The pool row is created by
/// the first claim and reused afterwards; the live-slot unique index and the
/// revision check make sure only one claim per round wins.
fn claim_pool_tx(
    tx: &Transaction<'_>,
    actor: &Membership,
    template: &ChoreTemplate,
    stored: Option<StoredAssignment>,
    now_ms: i64,
) -> Result<Assignment, StoreError> {
    let current = match stored {
        Some(stored) => Some(stored.assignment),
        None => load_live_slot(tx, &template.id, &Slot::Pool)?,
    };

    let Some(current) = current else {
        let fresh = Assignment::new_available(next_assignment_id(tx)?, template.id.clone(), Slot::Pool);
        let claimed = fresh.complete(&actor.member_id, &template.recurrence, now_ms)?;
        return match insert_assignment_tx(tx, &claimed, now_ms) {
            Ok(()) => Ok(claimed),
            Err(err) => {
                if matches!(err, StoreError::Conflict { .. }) {
                    warn!(template = %template.id, actor = %actor.member_id, "lost pool claim");
                }
                Err(err)
            }
        };
    };

    let refreshed = current.refreshed(&template.recurrence, now_ms);
    match refreshed.state {
        AssignmentState::Available => {}
        AssignmentState::Completed => {
            warn!(template = %template.id, actor = %actor.member_id, "lost pool claim");
            let holder = refreshed
                .assignee_id
                .as_ref()
                .map(|member| member.to_string())
                .unwrap_or_default();
            return Err(StoreError::conflict(format!(
                "pool chore {} was already claimed by {holder}",
                template.id
            )));
        }
        AssignmentState::Approved => {
            return match refreshed.gate(&template.recurrence, now_ms) {
                Gate::CoolingDown { until_ms } => Err(StoreError::conflict(format!(
                    "pool chore {} is cooling down until {until_ms}",
                    template.id
                ))),
                Gate::Closed | Gate::Open => Err(TransitionError::AlreadyApproved.into()),
            };
        }
    }

    let mut next = current.complete(&actor.member_id, &template.recurrence, now_ms)?;
    let result = store_assignment_tx(tx, current.revision, &mut next, now_ms);
    if let Err(StoreError::Conflict { .. }) = &result {
        warn!(template = %template.id, actor = %actor.member_id, "lost pool claim");
    }
    result.map(|()| next)
}

/// Loads an assignment for approval or rejection and checks that `actor_id`
/// is a parent in the family that owns the work.
fn load_for_review(
    tx: &Transaction<'_>,
    actor_id: &MemberId,
    assignment_id: &AssignmentId,
) -> Result<(StoredAssignment, ChoreTemplate), StoreError> {
    let actor = require_actor(tx, actor_id)?;
    let stored = load_assignment(tx, assignment_id)?;
    let template = load_template(tx, &stored.assignment.template_id)?;
    if !actor.can_administer(&template.family_id) {
        return Err(StoreError::unauthorized(format!(
            "{actor_id} may not review work in family {}",
            template.family_id
        )));
    }
    if let Some(assignee_id) = &stored.assignment.assignee_id {
        let assignee = require_member(tx, assignee_id)?;
        if !actor.can_approve_for(&assignee) {
            return Err(StoreError::unauthorized(format!(
                "{actor_id} may not review work of {assignee_id}"
            )));
        }
    }
    if stored.is_retired() {
        return Err(StoreError::state(format!(
            "assignment {assignment_id} was removed from its template"
        )));
    }
    Ok((stored, template))
}

fn review_error(err: TransitionError, current: &Assignment) -> StoreError {
    match err {
        TransitionError::WrongState { actual, .. } => StoreError::state(format!(
            "assignment {} is {actual}, not awaiting approval",
            current.id
        )),
        other => other.into(),
    }
}

fn insert_reward_event_tx(tx: &Transaction<'_>, event: &RewardEvent) -> Result<(), StoreError> {
    tx.execute(
        r#"
        INSERT INTO reward_events(id, assignee_id, amount, source_assignment_id, round, created_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            event.id,
            event.assignee_id.as_str(),
            event.amount.to_string(),
            event.source_assignment_id.as_str(),
            event.round,
            event.created_at_ms,
        ],
    )?;
    Ok(())
}
