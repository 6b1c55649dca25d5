#![forbid(unsafe_code)]

mod common;

use cb_core::{
    AssignmentMode, AssignmentState, ChoreTemplate, Recurrence, TemplateId, TemplatePatch,
    TemplateSpec,
};
use cb_storage::{
    CreateTemplateRequest, ListTemplatesRequest, SqliteStore, StoreError, ToggleTemplateRequest,
    UpdateTemplateRequest,
};
use common::*;

fn update(
    store: &mut SqliteStore,
    template_id: &TemplateId,
    expected_revision: Option<i64>,
    patch: TemplatePatch,
) -> Result<ChoreTemplate, StoreError> {
    store.update_template(UpdateTemplateRequest {
        actor_id: member("mom"),
        template_id: template_id.clone(),
        expected_revision,
        patch,
        updated_at_ms: T0 + 1,
    })
}

fn live_assignees(store: &SqliteStore, template_id: &TemplateId) -> Vec<String> {
    store
        .list_assignments_for_template(template_id, T0)
        .expect("assignments")
        .into_iter()
        .filter_map(|assignment| assignment.assignee_id.map(|id| id.to_string()))
        .collect()
}

#[test]
fn create_materializes_one_assignment_per_assignee() {
    let (_dir, mut store) = seeded_store();

    let walk = create(
        &mut store,
        spec("Walk the dog", single("ann"), fixed("1"), Recurrence::one_time()),
    );
    assert_eq!(walk.revision, 1);
    assert!(walk.enabled);
    assert_eq!(live_assignees(&store, &walk.id), ["ann"]);

    let beds = create(
        &mut store,
        spec("Make bed", multi(&["cal", "ann", "bob"]), fixed("0.50"), Recurrence::one_time()),
    );
    assert_eq!(live_assignees(&store, &beds.id), ["ann", "bob", "cal"]);
    for assignment in store
        .list_assignments_for_template(&beds.id, T0)
        .expect("assignments")
    {
        assert_eq!(assignment.state, AssignmentState::Available);
        assert_eq!(assignment.round, 1);
    }

    let trash = create(
        &mut store,
        spec("Trash", AssignmentMode::UnassignedPool, fixed("2"), Recurrence::one_time()),
    );
    assert!(live_assignees(&store, &trash.id).is_empty());

    let listed = store
        .list_templates(ListTemplatesRequest {
            family_id: family("smith"),
            include_disabled: false,
        })
        .expect("list");
    let ids: Vec<_> = listed.into_iter().map(|template| template.id).collect();
    assert_eq!(ids, [walk.id, beds.id, trash.id]);
}

#[test]
fn create_rejects_malformed_input_and_foreign_actors() {
    let (_dir, mut store) = seeded_store();

    let mut blank = spec("   ", single("ann"), fixed("1"), Recurrence::one_time());
    let attempt = |store: &mut SqliteStore, actor: &str, spec: TemplateSpec| {
        store.create_template(CreateTemplateRequest {
            actor_id: member(actor),
            spec,
            created_at_ms: T0,
        })
    };
    match attempt(&mut store, "mom", blank.clone()).unwrap_err() {
        StoreError::Validation(err) => assert_eq!(err.field, "title"),
        other => panic!("expected validation error, got {other:?}"),
    }

    blank.title = "Walk the dog".to_string();
    blank.assignment_mode = multi(&[]);
    assert_eq!(
        attempt(&mut store, "mom", blank.clone()).unwrap_err().code(),
        "VALIDATION"
    );

    for outsider in ["ghost", "zed"] {
        blank.assignment_mode = single(outsider);
        match attempt(&mut store, "mom", blank.clone()).unwrap_err() {
            StoreError::Validation(err) => assert_eq!(err.field, "assignees"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    blank.assignment_mode = single("ann");
    for actor in ["ann", "dad", "nobody"] {
        assert_eq!(
            attempt(&mut store, actor, blank.clone()).unwrap_err().code(),
            "UNAUTHORIZED",
            "actor {actor}"
        );
    }

    assert!(
        store
            .list_templates(ListTemplatesRequest {
                family_id: family("smith"),
                include_disabled: true,
            })
            .expect("list")
            .is_empty()
    );
}

#[test]
fn update_checks_revision_and_reports_unknown_templates() {
    let (_dir, mut store) = seeded_store();
    let template = create(
        &mut store,
        spec("Walk the dog", single("ann"), fixed("1"), Recurrence::one_time()),
    );

    let renamed = update(
        &mut store,
        &template.id,
        Some(1),
        TemplatePatch {
            title: Some("  Walk the dog twice ".to_string()),
            ..TemplatePatch::default()
        },
    )
    .expect("update");
    assert_eq!(renamed.title, "Walk the dog twice");
    assert_eq!(renamed.revision, 2);
    assert_eq!(store.get_template(&template.id).expect("get"), renamed);

    let stale = update(
        &mut store,
        &template.id,
        Some(1),
        TemplatePatch {
            description: Some("leash is by the door".to_string()),
            ..TemplatePatch::default()
        },
    )
    .unwrap_err();
    assert_eq!(stale.code(), "STATE");

    assert_eq!(
        update(&mut store, &template.id, None, TemplatePatch::default())
            .unwrap_err()
            .code(),
        "VALIDATION"
    );

    let unknown = TemplateId::try_new("CHORE-9999").expect("id");
    let missing = update(
        &mut store,
        &unknown,
        None,
        TemplatePatch {
            title: Some("x".to_string()),
            ..TemplatePatch::default()
        },
    )
    .unwrap_err();
    assert_eq!(missing.code(), "NOT_FOUND");
    assert_eq!(store.get_template(&unknown).unwrap_err().code(), "NOT_FOUND");
    for result in [
        store.disable_template(ToggleTemplateRequest {
            actor_id: member("mom"),
            template_id: unknown.clone(),
            updated_at_ms: T0,
        }),
        store.enable_template(ToggleTemplateRequest {
            actor_id: member("mom"),
            template_id: unknown.clone(),
            updated_at_ms: T0,
        }),
    ] {
        assert_eq!(result.unwrap_err().code(), "NOT_FOUND");
    }
}

#[test]
fn changing_assignees_keeps_retires_and_creates_slots() {
    let (_dir, mut store) = seeded_store();
    let template = create(
        &mut store,
        spec("Homework", multi(&["ann", "bob"]), fixed("1"), Recurrence::one_time()),
    );
    let ann_assignment = assignment_of(&store, &template.id, "ann");
    let bob_assignment = assignment_of(&store, &template.id, "bob");

    update(
        &mut store,
        &template.id,
        None,
        TemplatePatch {
            assignment_mode: Some(multi(&["bob", "cal"])),
            ..TemplatePatch::default()
        },
    )
    .expect("reassign");

    assert_eq!(live_assignees(&store, &template.id), ["bob", "cal"]);
    assert_eq!(assignment_of(&store, &template.id, "bob"), bob_assignment);
    assert!(
        store
            .list_available_for(&member("ann"), T0)
            .expect("available")
            .is_empty()
    );
    let retired = store.get_assignment(&ann_assignment, T0).expect("retired stays readable");
    assert_eq!(retired.assignment.assignee_id, Some(member("ann")));
    assert_eq!(
        complete_assignment(&mut store, "ann", &ann_assignment, T0)
            .unwrap_err()
            .code(),
        "STATE"
    );

    update(
        &mut store,
        &template.id,
        None,
        TemplatePatch {
            assignment_mode: Some(AssignmentMode::UnassignedPool),
            ..TemplatePatch::default()
        },
    )
    .expect("switch to pool");
    assert!(live_assignees(&store, &template.id).is_empty());
    assert_eq!(
        store
            .list_available_for(&member("ann"), T0)
            .expect("available")
            .claimable
            .len(),
        1
    );
}

#[test]
fn removing_an_assignee_with_pending_work_is_refused() {
    let (_dir, mut store) = seeded_store();
    let template = create(
        &mut store,
        spec("Homework", multi(&["ann", "bob"]), fixed("1"), Recurrence::one_time()),
    );
    let ann_assignment = assignment_of(&store, &template.id, "ann");
    complete_assignment(&mut store, "ann", &ann_assignment, T0).expect("complete");

    let refused = update(
        &mut store,
        &template.id,
        None,
        TemplatePatch {
            assignment_mode: Some(single("bob")),
            ..TemplatePatch::default()
        },
    )
    .unwrap_err();
    assert_eq!(refused.code(), "STATE");

    let unchanged = store.get_template(&template.id).expect("get");
    assert_eq!(unchanged.revision, 1);
    assert_eq!(unchanged.assignment_mode, multi(&["ann", "bob"]));
    assert_eq!(live_assignees(&store, &template.id), ["ann", "bob"]);
}

#[test]
fn disable_and_enable_are_parent_only_and_idempotent() {
    let (_dir, mut store) = seeded_store();
    let template = create(
        &mut store,
        spec("Walk the dog", single("ann"), fixed("1"), Recurrence::one_time()),
    );
    let toggle = |actor: &str| ToggleTemplateRequest {
        actor_id: member(actor),
        template_id: template.id.clone(),
        updated_at_ms: T0 + 5,
    };

    assert_eq!(
        store.disable_template(toggle("ann")).unwrap_err().code(),
        "UNAUTHORIZED"
    );
    let disabled = store.disable_template(toggle("mom")).expect("disable");
    assert!(!disabled.enabled);
    assert_eq!(disabled.revision, 2);
    let again = store.disable_template(toggle("mom")).expect("disable again");
    assert_eq!(again.revision, 2);

    let visible = store
        .list_templates(ListTemplatesRequest {
            family_id: family("smith"),
            include_disabled: false,
        })
        .expect("list");
    assert!(visible.is_empty());
    let all = store
        .list_templates(ListTemplatesRequest {
            family_id: family("smith"),
            include_disabled: true,
        })
        .expect("list");
    assert_eq!(all.len(), 1);

    let enabled = store.enable_template(toggle("mom")).expect("enable");
    assert!(enabled.enabled);
    assert_eq!(enabled.revision, 3);
}

#[test]
fn disabled_template_edits_create_slots_only_once_enabled() {
    let (_dir, mut store) = seeded_store();
    let template = create(
        &mut store,
        spec("Set the table", single("ann"), fixed("1"), Recurrence::one_time()),
    );
    let toggle = ToggleTemplateRequest {
        actor_id: member("mom"),
        template_id: template.id.clone(),
        updated_at_ms: T0 + 1,
    };
    store.disable_template(toggle.clone()).expect("disable");

    let edited = update(
        &mut store,
        &template.id,
        None,
        TemplatePatch {
            assignment_mode: Some(multi(&["bob", "cal"])),
            ..TemplatePatch::default()
        },
    )
    .expect("edit while disabled");
    assert!(!edited.enabled);
    assert!(live_assignees(&store, &template.id).is_empty());

    let enabled = store.enable_template(toggle).expect("enable");
    assert!(enabled.enabled);
    assert_eq!(live_assignees(&store, &template.id), ["bob", "cal"]);
    assert_eq!(
        store
            .list_available_for(&member("bob"), T0 + 2)
            .expect("available")
            .assigned
            .len(),
        1
    );
}
