#![forbid(unsafe_code)]

use super::assignments::{insert_assignment_tx, retire_assignment_tx};
use super::members::{require_assignees_in_family, require_parent_of};
use super::rows::{
    TEMPLATE_COLUMNS, encode_template_json, load_live_assignments, load_template,
    read_template_row,
};
use super::{
    CreateTemplateRequest, ListTemplatesRequest, SqliteStore, StoreError, ToggleTemplateRequest,
    UpdateTemplateRequest, next_id_tx,
};
use cb_core::{
    Assignment, AssignmentId, AssignmentState, ChoreTemplate, TemplateId, ValidationError,
    reconcile_slots,
};
use rusqlite::{Transaction, params};
use tracing::{debug, info};

impl SqliteStore {
    pub fn create_template(
        &mut self,
        request: CreateTemplateRequest,
    ) -> Result<ChoreTemplate, StoreError> {
        request.spec.validate()?;
        let spec = request.spec;

        let tx = self.write_tx()?;
        require_parent_of(&tx, &request.actor_id, &spec.family_id)?;
        require_assignees_in_family(&tx, &spec.assignment_mode.assignees(), &spec.family_id)?;

        let id = TemplateId::try_new(next_id_tx(&tx, "template", "CHORE")?)
            .map_err(|_| StoreError::Corrupt("generated template id"))?;
        let template = ChoreTemplate {
            id,
            family_id: spec.family_id,
            revision: 1,
            title: spec.title.trim().to_string(),
            description: spec.description,
            assignment_mode: spec.assignment_mode,
            reward: spec.reward,
            recurrence: spec.recurrence,
            enabled: true,
            created_at_ms: request.created_at_ms,
            updated_at_ms: request.created_at_ms,
        };

        let json = encode_template_json(&template)?;
        tx.execute(
            r#"
            INSERT INTO templates(
              id, family_id, revision, title, description, mode_kind, mode_json,
              reward_json, recurrence_json, enabled, created_at_ms, updated_at_ms
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)
            "#,
            params![
                template.id.as_str(),
                template.family_id.as_str(),
                template.revision,
                template.title,
                template.description,
                template.assignment_mode.name(),
                json.mode,
                json.reward,
                json.recurrence,
                template.created_at_ms,
            ],
        )?;

        let slots = template.assignment_mode.eager_slots();
        for slot in &slots {
            let assignment_id = next_assignment_id(&tx)?;
            let assignment =
                Assignment::new_available(assignment_id, template.id.clone(), slot.clone());
            insert_assignment_tx(&tx, &assignment, request.created_at_ms)?;
        }

        tx.commit()?;
        info!(
            template = %template.id,
            family = %template.family_id,
            mode = template.assignment_mode.name(),
            assignments = slots.len(),
            "template created"
        );
        Ok(template)
    }

    /// Applies a partial edit. Changing the assignment mode or its assignees
    /// reconciles the live assignments in the same transaction.
    pub fn update_template(
        &mut self,
        request: UpdateTemplateRequest,
    ) -> Result<ChoreTemplate, StoreError> {
        if request.patch.is_empty() {
            return Err(ValidationError::new("patch", "must change at least one field").into());
        }

        let tx = self.write_tx()?;
        let current = load_template(&tx, &request.template_id)?;
        require_parent_of(&tx, &request.actor_id, &current.family_id)?;
        if let Some(expected) = request.expected_revision
            && expected != current.revision
        {
            return Err(StoreError::state(format!(
                "template {} is at revision {}, expected {expected}",
                current.id, current.revision
            )));
        }

        let mut next = current.patched(&request.patch)?;
        if next.assignment_mode != current.assignment_mode {
            require_assignees_in_family(&tx, &next.assignment_mode.assignees(), &next.family_id)?;
            reconcile_assignments_tx(&tx, &next, request.updated_at_ms)?;
        }
        next.revision = current.revision + 1;
        next.updated_at_ms = request.updated_at_ms;

        let json = encode_template_json(&next)?;
        let updated = tx.execute(
            r#"
            UPDATE templates
            SET revision=?3, title=?4, description=?5, mode_kind=?6, mode_json=?7,
                reward_json=?8, recurrence_json=?9, updated_at_ms=?10
            WHERE id=?1 AND revision=?2
            "#,
            params![
                next.id.as_str(),
                current.revision,
                next.revision,
                next.title,
                next.description,
                next.assignment_mode.name(),
                json.mode,
                json.reward,
                json.recurrence,
                next.updated_at_ms,
            ],
        )?;
        if updated != 1 {
            return Err(StoreError::conflict(format!(
                "template {} changed concurrently",
                next.id
            )));
        }

        tx.commit()?;
        info!(template = %next.id, revision = next.revision, "template updated");
        Ok(next)
    }

    /// Hides the template from claim and completion listings. Existing
    /// assignment states are left as they are.
    pub fn disable_template(
        &mut self,
        request: ToggleTemplateRequest,
    ) -> Result<ChoreTemplate, StoreError> {
        self.set_template_enabled(request, false)
    }

    pub fn enable_template(
        &mut self,
        request: ToggleTemplateRequest,
    ) -> Result<ChoreTemplate, StoreError> {
        self.set_template_enabled(request, true)
    }

    fn set_template_enabled(
        &mut self,
        request: ToggleTemplateRequest,
        enabled: bool,
    ) -> Result<ChoreTemplate, StoreError> {
        let tx = self.write_tx()?;
        let mut template = load_template(&tx, &request.template_id)?;
        require_parent_of(&tx, &request.actor_id, &template.family_id)?;
        if template.enabled == enabled {
            return Ok(template);
        }

        template.enabled = enabled;
        if enabled {
            reconcile_assignments_tx(&tx, &template, request.updated_at_ms)?;
        }
        tx.execute(
            "UPDATE templates SET enabled=?2, revision=revision+1, updated_at_ms=?3 WHERE id=?1",
            params![template.id.as_str(), enabled as i64, request.updated_at_ms],
        )?;
        tx.commit()?;

        template.revision += 1;
        template.updated_at_ms = request.updated_at_ms;
        info!(template = %template.id, enabled, "template toggled");
        Ok(template)
    }

    pub fn get_template(&self, id: &TemplateId) -> Result<ChoreTemplate, StoreError> {
        load_template(&self.conn, id)
    }

    pub fn list_templates(
        &self,
        request: ListTemplatesRequest,
    ) -> Result<Vec<ChoreTemplate>, StoreError> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates \
             WHERE family_id=?1 AND (?2 OR enabled=1) ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![request.family_id.as_str(), request.include_disabled])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_template_row(row)?.decode()?);
        }
        Ok(out)
    }
}

pub(super) fn next_assignment_id(tx: &Transaction<'_>) -> Result<AssignmentId, StoreError> {
    AssignmentId::try_new(next_id_tx(tx, "assignment", "ASN")?)
        .map_err(|_| StoreError::Corrupt("generated assignment id"))
}

/// Moves live assignments onto the template's new mode. Work awaiting review
/// is never dropped: retiring a `completed` assignment fails the edit.
/// A disabled template only retires; its missing slots are created when it
/// is enabled again.
fn reconcile_assignments_tx(
    tx: &Transaction<'_>,
    template: &ChoreTemplate,
    now_ms: i64,
) -> Result<(), StoreError> {
    let live = load_live_assignments(tx, &template.id)?;
    let slots: Vec<_> = live.iter().map(|assignment| assignment.slot.clone()).collect();
    let plan = reconcile_slots(&slots, &template.assignment_mode);
    if plan.is_noop() {
        return Ok(());
    }

    for slot in &plan.retire {
        let Some(assignment) = live.iter().find(|assignment| &assignment.slot == slot) else {
            continue;
        };
        if assignment.state == AssignmentState::Completed {
            return Err(StoreError::state(format!(
                "assignment {} is awaiting approval; approve or reject it before removing its assignee",
                assignment.id
            )));
        }
        retire_assignment_tx(tx, assignment, now_ms)?;
    }
    let create = if template.enabled { plan.create.as_slice() } else { &[] };
    for slot in create {
        let assignment_id = next_assignment_id(tx)?;
        let assignment = Assignment::new_available(assignment_id, template.id.clone(), slot.clone());
        insert_assignment_tx(tx, &assignment, now_ms)?;
    }

    debug!(
        template = %template.id,
        retired = plan.retire.len(),
        created = create.len(),
        "assignments reconciled"
    );
    Ok(())
}
