#![forbid(unsafe_code)]

use super::members::require_actor;
use super::rows::{
    ASSIGNMENT_COLUMNS, load_assignment, load_live_assignments, load_live_slot, load_template,
    read_assignment_row,
};
use super::{
    AssignmentView, AvailableChores, ListTemplatesRequest, SqliteStore, StoreError,
    is_unique_violation,
};
use cb_core::{Assignment, AssignmentId, ChoreTemplate, FamilyId, MemberId, Slot, TemplateId};
use rusqlite::{Transaction, params};
use std::collections::BTreeMap;

impl SqliteStore {
    /// The assignment as of `now_ms`, with any elapsed cooldown already applied.
    /// Retired assignments stay readable by id.
    pub fn get_assignment(
        &self,
        id: &AssignmentId,
        now_ms: i64,
    ) -> Result<AssignmentView, StoreError> {
        let stored = load_assignment(&self.conn, id)?;
        let template = load_template(&self.conn, &stored.assignment.template_id)?;
        Ok(AssignmentView {
            assignment: stored.assignment.refreshed(&template.recurrence, now_ms),
            template,
        })
    }

    pub fn list_assignments_for_template(
        &self,
        template_id: &TemplateId,
        now_ms: i64,
    ) -> Result<Vec<Assignment>, StoreError> {
        let template = load_template(&self.conn, template_id)?;
        Ok(load_live_assignments(&self.conn, template_id)?
            .into_iter()
            .map(|assignment| assignment.refreshed(&template.recurrence, now_ms))
            .collect())
    }

    /// What `member_id` can complete right now: their own `available`
    /// assignments and the pool chores nobody holds. Disabled templates and
    /// assignments still cooling down are left out.
    pub fn list_available_for(
        &self,
        member_id: &MemberId,
        now_ms: i64,
    ) -> Result<AvailableChores, StoreError> {
        let member = require_actor(&self.conn, member_id)?;
        let templates = self.list_templates(ListTemplatesRequest {
            family_id: member.family_id,
            include_disabled: false,
        })?;

        let mut available = AvailableChores::default();
        for template in templates {
            let slot = if template.assignment_mode.is_pool() {
                Slot::Pool
            } else {
                Slot::Member(member_id.clone())
            };
            let current = load_live_slot(&self.conn, &template.id, &slot)?;
            match current {
                None if slot.is_pool() => available.claimable.push(template),
                None => {}
                Some(assignment) => {
                    if !assignment.is_available_to(member_id, &template.recurrence, now_ms) {
                        continue;
                    }
                    if slot.is_pool() {
                        available.claimable.push(template);
                    } else {
                        available.assigned.push(AssignmentView {
                            assignment: assignment.refreshed(&template.recurrence, now_ms),
                            template,
                        });
                    }
                }
            }
        }
        Ok(available)
    }

    /// Completed work in `family_id` waiting for a parent, oldest first.
    /// Disabled templates are included so pending work can still be settled.
    pub fn list_pending_approval_for(
        &self,
        family_id: &FamilyId,
    ) -> Result<Vec<AssignmentView>, StoreError> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a \
             JOIN templates t ON t.id = a.template_id \
             WHERE t.family_id=?1 AND a.state='completed' AND a.retired_at_ms IS NULL \
             ORDER BY a.completed_at_ms ASC, a.id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![family_id.as_str()])?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next()? {
            pending.push(read_assignment_row(row, 0)?.decode()?.assignment);
        }

        let mut templates: BTreeMap<TemplateId, ChoreTemplate> = BTreeMap::new();
        let mut out = Vec::with_capacity(pending.len());
        for assignment in pending {
            let template = match templates.get(&assignment.template_id) {
                Some(template) => template.clone(),
                None => {
                    let template = load_template(&self.conn, &assignment.template_id)?;
                    templates.insert(template.id.clone(), template.clone());
                    template
                }
            };
            out.push(AssignmentView {
                assignment,
                template,
            });
        }
        Ok(out)
    }
}

/// Inserts a new live assignment. Losing the per-slot uniqueness race is a
/// conflict, not an infrastructure fault.
pub(super) fn insert_assignment_tx(
    tx: &Transaction<'_>,
    assignment: &Assignment,
    now_ms: i64,
) -> Result<(), StoreError> {
    let inserted = tx.execute(
        r#"
        INSERT INTO assignments(
          id, template_id, slot, assignee_id, state, round, revision,
          completed_at_ms, approved_at_ms, approved_reward, rejection_reason,
          next_available_at_ms, created_at_ms, updated_at_ms
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
        "#,
        params![
            assignment.id.as_str(),
            assignment.template_id.as_str(),
            assignment.slot.key(),
            assignment.assignee_id.as_ref().map(MemberId::as_str),
            assignment.state.as_str(),
            assignment.round,
            assignment.revision,
            assignment.completed_at_ms,
            assignment.approved_at_ms,
            assignment.approved_reward.map(|amount| amount.to_string()),
            assignment.rejection_reason,
            assignment.next_available_at_ms,
            now_ms,
        ],
    );
    match inserted {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => Err(StoreError::conflict(format!(
            "slot {} of template {} is already taken",
            assignment.slot.key(),
            assignment.template_id
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Compare-and-swap write of a transitioned assignment. `next.revision` is
/// bumped past `expected_revision`; a concurrent writer makes this a conflict.
pub(super) fn store_assignment_tx(
    tx: &Transaction<'_>,
    expected_revision: i64,
    next: &mut Assignment,
    now_ms: i64,
) -> Result<(), StoreError> {
    next.revision = expected_revision + 1;
    let updated = tx.execute(
        r#"
        UPDATE assignments
        SET assignee_id=?3, state=?4, round=?5, revision=?6, completed_at_ms=?7,
            approved_at_ms=?8, approved_reward=?9, rejection_reason=?10,
            next_available_at_ms=?11, updated_at_ms=?12
        WHERE id=?1 AND revision=?2 AND retired_at_ms IS NULL
        "#,
        params![
            next.id.as_str(),
            expected_revision,
            next.assignee_id.as_ref().map(MemberId::as_str),
            next.state.as_str(),
            next.round,
            next.revision,
            next.completed_at_ms,
            next.approved_at_ms,
            next.approved_reward.map(|amount| amount.to_string()),
            next.rejection_reason,
            next.next_available_at_ms,
            now_ms,
        ],
    )?;
    if updated != 1 {
        return Err(StoreError::conflict(format!(
            "assignment {} changed concurrently",
            next.id
        )));
    }
    Ok(())
}

pub(super) fn retire_assignment_tx(
    tx: &Transaction<'_>,
    assignment: &Assignment,
    now_ms: i64,
) -> Result<(), StoreError> {
    let updated = tx.execute(
        "UPDATE assignments SET retired_at_ms=?3, updated_at_ms=?3, revision=revision+1 \
         WHERE id=?1 AND revision=?2 AND retired_at_ms IS NULL",
        params![assignment.id.as_str(), assignment.revision, now_ms],
    )?;
    if updated != 1 {
        return Err(StoreError::conflict(format!(
            "assignment {} changed concurrently",
            assignment.id
        )));
    }
    Ok(())
}
