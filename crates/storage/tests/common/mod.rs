#![forbid(unsafe_code)]
#![allow(dead_code)]

use cb_core::{
    Assignment, AssignmentId, AssignmentMode, ChoreTemplate, FamilyId, MemberId, Money, Recurrence, Role,
    RewardPolicy, TemplateId, TemplateSpec,
};
use cb_storage::{
    CompleteRequest, CompleteTarget, CreateTemplateRequest, RegisterMemberRequest, SqliteStore,
    StoreError,
};
use tempfile::TempDir;

pub const T0: i64 = 1_700_000_000_000;
pub const DAY_MS: i64 = 86_400_000;

pub fn member(id: &str) -> MemberId {
    MemberId::try_new(id).expect("member id")
}

pub fn family(id: &str) -> FamilyId {
    FamilyId::try_new(id).expect("family id")
}

pub fn money(value: &str) -> Money {
    Money::parse(value).expect("money")
}

/// A store holding two families: `smith` (parent `mom`, children `ann`,
/// `bob`, `cal`) and `jones` (parent `dad`, child `zed`).
pub fn seeded_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("temp dir");
    let mut store = SqliteStore::open(dir.path()).expect("open store");
    for (id, fam, role) in [
        ("mom", "smith", Role::Parent),
        ("ann", "smith", Role::Child),
        ("bob", "smith", Role::Child),
        ("cal", "smith", Role::Child),
        ("dad", "jones", Role::Parent),
        ("zed", "jones", Role::Child),
    ] {
        store
            .register_member(RegisterMemberRequest {
                member_id: member(id),
                family_id: family(fam),
                role,
                created_at_ms: T0,
            })
            .expect("register member");
    }
    (dir, store)
}

pub fn spec(
    title: &str,
    assignment_mode: AssignmentMode,
    reward: RewardPolicy,
    recurrence: Recurrence,
) -> TemplateSpec {
    TemplateSpec {
        family_id: family("smith"),
        title: title.to_string(),
        description: String::new(),
        assignment_mode,
        reward,
        recurrence,
    }
}

pub fn single(assignee: &str) -> AssignmentMode {
    AssignmentMode::Single {
        assignee: member(assignee),
    }
}

pub fn multi(assignees: &[&str]) -> AssignmentMode {
    AssignmentMode::MultiIndependent {
        assignees: assignees.iter().map(|id| member(id)).collect(),
    }
}

pub fn fixed(amount: &str) -> RewardPolicy {
    RewardPolicy::fixed(money(amount)).expect("fixed reward")
}

pub fn create(store: &mut SqliteStore, spec: TemplateSpec) -> ChoreTemplate {
    store
        .create_template(CreateTemplateRequest {
            actor_id: member("mom"),
            spec,
            created_at_ms: T0,
        })
        .expect("create template")
}

pub fn assignment_of(store: &SqliteStore, template_id: &TemplateId, assignee: &str) -> AssignmentId {
    store
        .list_assignments_for_template(template_id, T0)
        .expect("list assignments")
        .into_iter()
        .find(|assignment| assignment.assignee_id.as_ref() == Some(&member(assignee)))
        .map(|assignment| assignment.id)
        .expect("assignment for member")
}

pub fn complete_assignment(
    store: &mut SqliteStore,
    actor: &str,
    assignment_id: &AssignmentId,
    at_ms: i64,
) -> Result<Assignment, StoreError> {
    store.complete(CompleteRequest {
        actor_id: member(actor),
        target: CompleteTarget::Assignment(assignment_id.clone()),
        completed_at_ms: at_ms,
    })
}

pub fn claim_pool(
    store: &mut SqliteStore,
    actor: &str,
    template_id: &TemplateId,
    at_ms: i64,
) -> Result<Assignment, StoreError> {
    store.complete(CompleteRequest {
        actor_id: member(actor),
        target: CompleteTarget::PoolTemplate(template_id.clone()),
        completed_at_ms: at_ms,
    })
}
