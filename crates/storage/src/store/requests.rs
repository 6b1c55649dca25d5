#![forbid(unsafe_code)]

use cb_core::{AssignmentId, FamilyId, MemberId, Money, Role, TemplateId, TemplatePatch, TemplateSpec};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterMemberRequest {
    pub member_id: MemberId,
    pub family_id: FamilyId,
    pub role: Role,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateTemplateRequest {
    pub actor_id: MemberId,
    pub spec: TemplateSpec,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateTemplateRequest {
    pub actor_id: MemberId,
    pub template_id: TemplateId,
    pub expected_revision: Option<i64>,
    pub patch: TemplatePatch,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToggleTemplateRequest {
    pub actor_id: MemberId,
    pub template_id: TemplateId,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListTemplatesRequest {
    pub family_id: FamilyId,
    pub include_disabled: bool,
}

/// What a completion points at: a concrete assignment, or a pool template to claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompleteTarget {
    Assignment(AssignmentId),
    PoolTemplate(TemplateId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompleteRequest {
    pub actor_id: MemberId,
    pub target: CompleteTarget,
    pub completed_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApproveRequest {
    pub actor_id: MemberId,
    pub assignment_id: AssignmentId,
    pub chosen_reward: Option<Money>,
    pub approved_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectRequest {
    pub actor_id: MemberId,
    pub assignment_id: AssignmentId,
    pub reason: String,
    pub rejected_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApproveItem {
    pub assignment_id: AssignmentId,
    pub chosen_reward: Option<Money>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApproveManyRequest {
    pub actor_id: MemberId,
    pub items: Vec<ApproveItem>,
    pub approved_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectManyRequest {
    pub actor_id: MemberId,
    pub assignment_ids: Vec<AssignmentId>,
    pub reason: String,
    pub rejected_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateAdjustmentRequest {
    pub actor_id: MemberId,
    pub child_id: MemberId,
    pub amount: Money,
    pub reason: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordPayoutRequest {
    pub actor_id: MemberId,
    pub child_id: MemberId,
    pub amount: Money,
    pub note: Option<String>,
    pub created_at_ms: i64,
}
