#![forbid(unsafe_code)]

use crate::config::{Command, MemberCommand, RewardArgs, TemplateCommand, recurrence_from};
use crate::support::bulk;
use cb_core::{
    AssignmentMode, Recurrence, RewardPolicy, TemplatePatch, TemplateSpec, ValidationError,
};
use cb_storage::{
    ApproveManyRequest, ApproveRequest, CompleteRequest, CompleteTarget, CreateAdjustmentRequest,
    CreateTemplateRequest, ListTemplatesRequest, RecordPayoutRequest, RegisterMemberRequest,
    RejectManyRequest, RejectRequest, SqliteStore, StoreError, ToggleTemplateRequest,
    UpdateTemplateRequest,
};
use serde_json::{Value, json};

/// Runs one command against the store. Returns the intent name and the result payload.
pub(crate) fn execute(
    store: &mut SqliteStore,
    command: Command,
    now_ms: i64,
) -> anyhow::Result<(&'static str, Value)> {
    match command {
        Command::Member { command } => member(store, command, now_ms),
        Command::Template { command } => template(store, command, now_ms),
        Command::Available { member } => {
            let available = store.list_available_for(&member, now_ms)?;
            Ok(("available", serde_json::to_value(available)?))
        }
        Command::Pending { family } => {
            let pending = store.list_pending_approval_for(&family)?;
            Ok(("pending", serde_json::to_value(pending)?))
        }
        Command::Show { assignment } => {
            let view = store.get_assignment(&assignment, now_ms)?;
            Ok(("show", serde_json::to_value(view)?))
        }
        Command::Complete {
            actor,
            assignment,
            pool,
        } => {
            let target = match (assignment, pool) {
                (Some(id), None) => CompleteTarget::Assignment(id),
                (None, Some(id)) => CompleteTarget::PoolTemplate(id),
                _ => {
                    return Err(StoreError::Validation(ValidationError::new(
                        "target",
                        "pass exactly one of --assignment or --pool",
                    ))
                    .into());
                }
            };
            let assignment = store.complete(CompleteRequest {
                actor_id: actor,
                target,
                completed_at_ms: now_ms,
            })?;
            Ok(("complete", serde_json::to_value(assignment)?))
        }
        Command::Approve {
            actor,
            assignment,
            reward,
        } => {
            let approval = store.approve(ApproveRequest {
                actor_id: actor,
                assignment_id: assignment,
                chosen_reward: reward,
                approved_at_ms: now_ms,
            })?;
            Ok(("approve", serde_json::to_value(approval)?))
        }
        Command::ApproveMany { actor, items } => {
            let outcomes = store.approve_many(ApproveManyRequest {
                actor_id: actor,
                items,
                approved_at_ms: now_ms,
            });
            Ok(("approve_many", bulk(outcomes)?))
        }
        Command::Reject {
            actor,
            assignment,
            reason,
        } => {
            let assignment = store.reject(RejectRequest {
                actor_id: actor,
                assignment_id: assignment,
                reason,
                rejected_at_ms: now_ms,
            })?;
            Ok(("reject", serde_json::to_value(assignment)?))
        }
        Command::RejectMany {
            actor,
            assignments,
            reason,
        } => {
            let outcomes = store.reject_many(RejectManyRequest {
                actor_id: actor,
                assignment_ids: assignments,
                reason,
                rejected_at_ms: now_ms,
            });
            Ok(("reject_many", bulk(outcomes)?))
        }
        Command::Adjust {
            actor,
            child,
            amount,
            reason,
        } => {
            let adjustment = store.create_adjustment(CreateAdjustmentRequest {
                actor_id: actor,
                child_id: child,
                amount,
                reason,
                created_at_ms: now_ms,
            })?;
            Ok(("adjust", serde_json::to_value(adjustment)?))
        }
        Command::Payout {
            actor,
            child,
            amount,
            note,
        } => {
            let payout = store.record_payout(RecordPayoutRequest {
                actor_id: actor,
                child_id: child,
                amount,
                note,
                created_at_ms: now_ms,
            })?;
            Ok(("payout", serde_json::to_value(payout)?))
        }
        Command::Balance { member, entries } => {
            let balance = store.balance_breakdown(&member)?;
            if !entries {
                return Ok(("balance", serde_json::to_value(balance)?));
            }
            Ok((
                "balance",
                json!({
                    "balance": balance,
                    "rewardEvents": store.list_reward_events(&member)?,
                    "adjustments": store.list_adjustments(&member)?,
                    "payouts": store.list_payouts(&member)?,
                }),
            ))
        }
    }
}

fn member(
    store: &mut SqliteStore,
    command: MemberCommand,
    now_ms: i64,
) -> anyhow::Result<(&'static str, Value)> {
    match command {
        MemberCommand::Add {
            member,
            family,
            role,
        } => {
            let membership = store.register_member(RegisterMemberRequest {
                member_id: member,
                family_id: family,
                role: role.into(),
                created_at_ms: now_ms,
            })?;
            Ok(("member_add", serde_json::to_value(membership)?))
        }
        MemberCommand::Show { member } => match store.membership(&member)? {
            Some(membership) => Ok(("member_show", serde_json::to_value(membership)?)),
            None => Err(StoreError::NotFound {
                kind: "member",
                id: member.into_string(),
            }
            .into()),
        },
    }
}

fn template(
    store: &mut SqliteStore,
    command: TemplateCommand,
    now_ms: i64,
) -> anyhow::Result<(&'static str, Value)> {
    match command {
        TemplateCommand::Create {
            actor,
            family,
            title,
            description,
            mode,
            reward,
            cooldown_days,
        } => {
            let spec = TemplateSpec {
                family_id: family,
                title,
                description,
                assignment_mode: mode.resolve().map_err(StoreError::from)?,
                reward: required_reward(&reward)?,
                recurrence: recurrence_from(cooldown_days).map_err(StoreError::from)?,
            };
            let template = store.create_template(CreateTemplateRequest {
                actor_id: actor,
                spec,
                created_at_ms: now_ms,
            })?;
            Ok(("template_create", serde_json::to_value(template)?))
        }
        TemplateCommand::Update {
            actor,
            template,
            expected_revision,
            title,
            description,
            mode,
            assignees,
            reward,
            cooldown_days,
            one_time,
        } => {
            let assignment_mode = match mode {
                Some(mode) => Some(
                    AssignmentMode::from_parts(mode.wire_name(), assignees)
                        .map_err(StoreError::from)?,
                ),
                None if assignees.is_empty() => None,
                None => {
                    return Err(StoreError::Validation(ValidationError::new(
                        "assignees",
                        "changing assignees needs --mode",
                    ))
                    .into());
                }
            };
            let recurrence = if one_time {
                Some(Recurrence::one_time())
            } else {
                cooldown_days
                    .map(Recurrence::recurring)
                    .transpose()
                    .map_err(StoreError::from)?
            };
            let patch = TemplatePatch {
                title,
                description,
                assignment_mode,
                reward: reward.resolve().map_err(StoreError::from)?,
                recurrence,
            };
            let template = store.update_template(UpdateTemplateRequest {
                actor_id: actor,
                template_id: template,
                expected_revision,
                patch,
                updated_at_ms: now_ms,
            })?;
            Ok(("template_update", serde_json::to_value(template)?))
        }
        TemplateCommand::Disable { actor, template } => {
            let template = store.disable_template(ToggleTemplateRequest {
                actor_id: actor,
                template_id: template,
                updated_at_ms: now_ms,
            })?;
            Ok(("template_disable", serde_json::to_value(template)?))
        }
        TemplateCommand::Enable { actor, template } => {
            let template = store.enable_template(ToggleTemplateRequest {
                actor_id: actor,
                template_id: template,
                updated_at_ms: now_ms,
            })?;
            Ok(("template_enable", serde_json::to_value(template)?))
        }
        TemplateCommand::Get {
            template,
            assignments,
        } => {
            let found = store.get_template(&template)?;
            if !assignments {
                return Ok(("template_get", serde_json::to_value(found)?));
            }
            let live = store.list_assignments_for_template(&template, now_ms)?;
            Ok((
                "template_get",
                json!({ "template": found, "assignments": live }),
            ))
        }
        TemplateCommand::List { family, all } => {
            let templates = store.list_templates(ListTemplatesRequest {
                family_id: family,
                include_disabled: all,
            })?;
            Ok(("template_list", serde_json::to_value(templates)?))
        }
    }
}

fn required_reward(reward: &RewardArgs) -> Result<RewardPolicy, StoreError> {
    reward.resolve()?.ok_or_else(|| {
        StoreError::Validation(ValidationError::new(
            "reward",
            "pass --reward, or --reward-min with --reward-max",
        ))
    })
}
